use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::{PartnerSettings, TaxSettings};
use crate::error::{Error, Result};

/// Tunables shared by every request. Loaded once at startup; missing keys keep
/// their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    pub tax: TaxSettings,
    pub partner: PartnerSettings,
}

impl EngineSettings {
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: EngineSettings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let settings = Self::from_json(&raw)?;
        tracing::info!(path = %path.display(), "loaded engine settings");
        Ok(settings)
    }

    /// Loads `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    fn validate(&self) -> Result<()> {
        let tax = &self.tax;
        if !(tax.coefficient.is_finite() && (0.0..=1.0).contains(&tax.coefficient)) {
            return Err(Error::InvalidSettings(
                "tax.coefficient must be between 0 and 1".to_string(),
            ));
        }
        if !(tax.social_security_rate.is_finite()
            && (0.0..=1.0).contains(&tax.social_security_rate))
        {
            return Err(Error::InvalidSettings(
                "tax.socialSecurityRate must be between 0 and 1".to_string(),
            ));
        }
        if !tax.deductions.is_finite() || tax.deductions < 0.0 {
            return Err(Error::InvalidSettings(
                "tax.deductions must be >= 0".to_string(),
            ));
        }
        let fallback = self.partner.children_insurance_default;
        if !fallback.is_finite() || fallback < 0.0 {
            return Err(Error::InvalidSettings(
                "partner.childrenInsuranceDefault must be >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let settings = EngineSettings::from_json("{}").expect("defaults should load");
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.partner.children_insurance_default, 60.0);
    }

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let settings = EngineSettings::from_json(
            r#"{"tax": {"coefficient": 0.7}, "partner": {"childrenInsuranceMatch": "kids"}}"#,
        )
        .expect("settings should load");
        assert_eq!(settings.tax.coefficient, 0.7);
        assert_eq!(settings.tax.deductions, 250.0);
        assert_eq!(settings.partner.children_insurance_match, "kids");
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = EngineSettings::from_json(r#"{"tax": {"coefficient": 1.5}}"#)
            .expect_err("coefficient above 1 must fail");
        assert!(err.to_string().contains("tax.coefficient"));

        let err = EngineSettings::from_json(r#"{"partner": {"childrenInsuranceDefault": -1}}"#)
            .expect_err("negative fallback must fail");
        assert!(matches!(err, Error::InvalidSettings(_)));
    }

    #[test]
    fn bad_bracket_tables_surface_as_json_errors() {
        let err = EngineSettings::from_json(r#"{"tax": {"brackets": []}}"#)
            .expect_err("empty table must fail");
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = EngineSettings::load(Path::new("/definitely/not/here.json"))
            .expect_err("missing file must fail");
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_client_error());
    }
}
