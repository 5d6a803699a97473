use std::fmt;
use std::str::FromStr;

/// Named block sentinels accepted by the node alongside plain numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockTag {
    Latest,
    Earliest,
    Pending,
}

/// A block number or a named tag, serialized the way `eth_*` methods
/// expect it (`"0x10"` / `"latest"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockIdentifier {
    Number(u64),
    Tag(BlockTag),
}

impl BlockIdentifier {
    pub fn as_param(&self) -> String {
        match self {
            BlockIdentifier::Number(n) => format!("{n:#x}"),
            BlockIdentifier::Tag(BlockTag::Latest) => "latest".to_string(),
            BlockIdentifier::Tag(BlockTag::Earliest) => "earliest".to_string(),
            BlockIdentifier::Tag(BlockTag::Pending) => "pending".to_string(),
        }
    }
}

impl From<u64> for BlockIdentifier {
    fn from(n: u64) -> Self {
        BlockIdentifier::Number(n)
    }
}

impl fmt::Display for BlockIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_param())
    }
}

impl FromStr for BlockIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(BlockIdentifier::Tag(BlockTag::Latest)),
            "earliest" => Ok(BlockIdentifier::Tag(BlockTag::Earliest)),
            "pending" => Ok(BlockIdentifier::Tag(BlockTag::Pending)),
            _ => {
                let number = if let Some(hex) = s.strip_prefix("0x") {
                    u64::from_str_radix(hex, 16)
                } else {
                    s.parse()
                };
                number
                    .map(BlockIdentifier::Number)
                    .map_err(|_| format!("invalid block identifier: {s}"))
            }
        }
    }
}
