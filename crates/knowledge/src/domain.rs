//! Engineering domain detection and question enhancement.

use crate::config::EngineeringDomain;

/// Domain reported when the question names a standard but no known domain.
pub const STANDARDS_DOMAIN: &str = "规范标准";

/// Domain reported when nothing matches.
pub const GENERAL_DOMAIN: &str = "通用工程";

const STANDARD_PREFIXES: &[&str] = &["GB", "JGJ", "CJJ", "JGT", "DBJ"];

/// The domain a question was attributed to.
#[derive(Debug, Clone, Copy)]
pub enum DomainMatch<'a> {
    Known(&'a EngineeringDomain),
    Standards,
    General,
}

impl<'a> DomainMatch<'a> {
    pub fn name(&self) -> &'a str {
        match *self {
            Self::Known(domain) => domain.name.as_str(),
            Self::Standards => STANDARDS_DOMAIN,
            Self::General => GENERAL_DOMAIN,
        }
    }

    pub fn config(&self) -> Option<&'a EngineeringDomain> {
        match *self {
            Self::Known(domain) => Some(domain),
            _ => None,
        }
    }

    /// Related standard numbers, empty for the fallback domains.
    pub fn regulations(&self) -> &'a [String] {
        self.config().map(|d| d.regulations.as_slice()).unwrap_or(&[])
    }
}

/// Attribute a question to the first domain whose name or keyword occurs.
pub fn identify_domain<'a>(question: &str, domains: &'a [EngineeringDomain]) -> DomainMatch<'a> {
    let lower = question.to_lowercase();

    for domain in domains {
        if lower.contains(domain.name.as_str())
            || domain.keywords.iter().any(|k| lower.contains(k.as_str()))
        {
            return DomainMatch::Known(domain);
        }
    }

    let upper = question.to_uppercase();
    if STANDARD_PREFIXES.iter().any(|p| upper.contains(p)) {
        return DomainMatch::Standards;
    }

    DomainMatch::General
}

/// Append the domain hint and up to two related standards to the question.
pub fn enhance_question(question: &str, domain: DomainMatch<'_>) -> String {
    let mut enhanced = question.to_string();

    if let Some(config) = domain.config() {
        if let Some(ref hint) = config.hint {
            enhanced.push_str(&format!(" ({})", hint));
        }
        if !config.regulations.is_empty() {
            let related: Vec<&str> = config
                .regulations
                .iter()
                .take(2)
                .map(String::as_str)
                .collect();
            enhanced.push_str(&format!(" [相关规范: {}]", related.join("、")));
        }
    }

    enhanced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QaConfig;

    #[test]
    fn test_identify_by_keyword() {
        let config = QaConfig::default();
        let domain = identify_domain("梁的保护层厚度是多少", &config.domains);
        assert_eq!(domain.name(), "混凝土");
        assert_eq!(domain.regulations()[0], "GB 50010");
    }

    #[test]
    fn test_first_declared_domain_wins() {
        let config = QaConfig::default();
        // "承载力" is a keyword of both 钢结构 and 地基基础
        let domain = identify_domain("承载力验算", &config.domains);
        assert_eq!(domain.name(), "钢结构");
    }

    #[test]
    fn test_standards_fallback() {
        let config = QaConfig::default();
        let domain = identify_domain("gb 21734 的适用范围", &config.domains);
        assert_eq!(domain.name(), STANDARDS_DOMAIN);
        assert!(domain.regulations().is_empty());
    }

    #[test]
    fn test_general_fallback() {
        let config = QaConfig::default();
        assert_eq!(
            identify_domain("监理日志怎么写", &config.domains).name(),
            GENERAL_DOMAIN
        );
    }

    #[test]
    fn test_enhance_question() {
        let config = QaConfig::default();
        let domain = identify_domain("混凝土保护层厚度", &config.domains);
        assert_eq!(
            enhance_question("混凝土保护层厚度", domain),
            "混凝土保护层厚度 (请结合混凝土结构设计规范和施工验收规范) [相关规范: GB 50010、GB 50204]"
        );
    }

    #[test]
    fn test_enhance_general_question_is_unchanged() {
        assert_eq!(enhance_question("监理日志", DomainMatch::General), "监理日志");
    }
}
