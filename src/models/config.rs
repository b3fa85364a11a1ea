use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Applikationsinställningar, läses en gång vid uppstart.
///
/// Kärnlagret läser aldrig globalt tillstånd i anropsögonblicket;
/// inställningarna skickas in explicit där de behövs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Sökväg till databasfilen
    pub database_path: PathBuf,
    /// Katalog för databasbackuper
    pub backup_directory: PathBuf,
    /// Ta backup automatiskt vid uppstart
    #[serde(default)]
    pub auto_backup: bool,
    /// Generera sampeldata i en tom databas
    #[serde(default)]
    pub generate_sample_data: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        // Platform-specifika sökvägar via directories-craten
        let data_dir = directories::ProjectDirs::from("se", "myrdata", "Myrdata")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("./data"));

        Self {
            database_path: data_dir.join("myrdata.db"),
            backup_directory: data_dir.join("backups"),
            auto_backup: false,
            generate_sample_data: false,
        }
    }
}

impl AppSettings {
    /// Ladda från config-fil, eller defaults om filen saknas/är trasig
    pub fn load() -> Self {
        let config_path = directories::ProjectDirs::from("se", "myrdata", "Myrdata")
            .map(|dirs| dirs.config_dir().join("settings.toml"))
            .unwrap_or_else(|| PathBuf::from("settings.toml"));

        if let Ok(content) = std::fs::read_to_string(&config_path) {
            if let Ok(settings) = toml::from_str(&content) {
                return settings;
            }
        }

        Self::default()
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_dir = directories::ProjectDirs::from("se", "myrdata", "Myrdata")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("settings.toml");
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toml_roundtrip() {
        let settings = AppSettings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let loaded: AppSettings = toml::from_str(&toml_str).unwrap();
        assert_eq!(loaded.database_path, settings.database_path);
        assert_eq!(loaded.auto_backup, settings.auto_backup);
    }

    #[test]
    fn test_missing_flags_default_to_false() {
        // Äldre config utan flaggorna ska ge defaults
        let old_toml = r#"
database_path = "/tmp/myrdata.db"
backup_directory = "/tmp/backups"
"#;
        let loaded: AppSettings = toml::from_str(old_toml).unwrap();
        assert!(!loaded.auto_backup);
        assert!(!loaded.generate_sample_data);
    }
}
