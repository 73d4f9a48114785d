use std::fmt;

use semver::Version;

/// Host platform version reduced to its leading numeric segments, so editor
/// style strings such as `2022.3.20f1` compare as `2022.3.20`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PlatformVersion(Version);

impl PlatformVersion {
    pub fn parse(value: &str) -> Option<Self> {
        let mut numbers = [0_u64; 3];
        let mut seen = 0;
        for (slot, segment) in value.trim().split('.').take(3).enumerate() {
            let digits: String = segment.chars().take_while(char::is_ascii_digit).collect();
            let Ok(number) = digits.parse::<u64>() else {
                break;
            };
            numbers[slot] = number;
            seen += 1;
            if digits.len() != segment.len() {
                break;
            }
        }
        if seen == 0 {
            return None;
        }

        Some(Self(Version::new(numbers[0], numbers[1], numbers[2])))
    }

    pub fn version(&self) -> &Version {
        &self.0
    }
}

impl fmt::Display for PlatformVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
