//! Provider identification.

/// Provider type enum for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    Extractive,
}

impl ProviderType {
    /// Parse provider type from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Some(Self::Ollama),
            "extractive" | "offline" => Some(Self::Extractive),
            _ => None,
        }
    }

    /// Get the canonical provider name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Extractive => "extractive",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_type_parsing() {
        assert_eq!(ProviderType::parse("ollama"), Some(ProviderType::Ollama));
        assert_eq!(ProviderType::parse("Ollama"), Some(ProviderType::Ollama));
        assert_eq!(
            ProviderType::parse("extractive"),
            Some(ProviderType::Extractive)
        );
        assert_eq!(ProviderType::parse("offline"), Some(ProviderType::Extractive));
        assert_eq!(ProviderType::parse("unknown"), None);
    }

    #[test]
    fn test_canonical_names() {
        assert_eq!(ProviderType::Ollama.as_str(), "ollama");
        assert_eq!(ProviderType::Extractive.as_str(), "extractive");
    }
}
