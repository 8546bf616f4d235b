use crate::core::config::data::Config;

/// Masks all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "****".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("****{tail}")
}

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(base_url) => println!("  base-url: {base_url}"),
            None => println!("  base-url: (unset, {})", self.base_url_or_default()),
        }
        match &self.api_key {
            Some(api_key) => println!("  api-key: {}", mask_secret(api_key)),
            None => println!("  api-key: (unset)"),
        }
        match &self.default_model {
            Some(model) => println!("  default-model: {model}"),
            None => println!("  default-model: (unset, {})", self.model_or_default()),
        }
        match self.web_search_enabled() {
            true => println!("  web-search: on"),
            false => println!("  web-search: off"),
        }
        match self.strict_frames_enabled() {
            true => println!("  strict-frames: on"),
            false => println!("  strict-frames: off"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mask_secret;

    #[test]
    fn masks_short_and_long_secrets() {
        assert_eq!(mask_secret("abc"), "****");
        assert_eq!(mask_secret("sk-1234567890"), "****7890");
    }
}
