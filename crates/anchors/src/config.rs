//! Configuration schema for anchors
//!
//! Config lives at `.config/anchors/config.yaml` relative to the project root.
//! A missing file means defaults; every field has a default.

use anchors_core::{
    ConfigError, ParseOptions, Parser, PathFilter, SortMethod, TagOverride, TagRegistry,
    WalkSources,
};
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config path relative to the project root
pub const CONFIG_PATH: &str = ".config/anchors/config.yaml";

/// Default config path for a project root
pub fn default_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_PATH)
}

/// Root configuration for anchors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tags: TagsConfig,
    pub workspace: WorkspaceConfig,
    pub epic: EpicConfig,
    /// Debounce delay before a changed document is re-parsed
    pub parse_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tags: TagsConfig::default(),
            workspace: WorkspaceConfig::default(),
            epic: EpicConfig::default(),
            parse_delay_ms: 500,
        }
    }
}

/// Tag registry and matcher settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TagsConfig {
    /// Overrides merged onto the default tags
    pub list: Vec<TagOverride>,
    pub separators: Vec<String>,
    /// Prefix that turns a region tag into its end marker
    pub end_tag: String,
    pub match_case: bool,
    /// Labels read `TAG: text`
    pub show_tag_name: bool,
    pub display_line_number: bool,
    pub display_hierarchy_in_workspace: bool,
    pub sort_method: SortMethod,
}

impl Default for TagsConfig {
    fn default() -> Self {
        Self {
            list: Vec::new(),
            separators: vec![" ".into(), ": ".into(), " - ".into()],
            end_tag: "!".into(),
            match_case: false,
            show_tag_name: true,
            display_line_number: true,
            display_hierarchy_in_workspace: true,
            sort_method: SortMethod::Line,
        }
    }
}

/// Workspace scan settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    pub enabled: bool,
    /// Only scan when asked to instead of on startup
    pub lazy_load: bool,
    pub max_files: usize,
    pub match_files: Vec<String>,
    pub exclude_files: Vec<String>,
    pub path_format: PathFormat,
}

impl Default for WorkspaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            lazy_load: false,
            max_files: 50,
            match_files: vec!["**/*".into()],
            exclude_files: vec![
                "**/node_modules/**".into(),
                "**/target/**".into(),
                "**/.git/**".into(),
            ],
            path_format: PathFormat::Full,
        }
    }
}

/// How document paths are shown in workspace listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathFormat {
    /// Path relative to the project root
    #[default]
    Full,
    /// Inner directories shortened to their first character
    Abbreviated,
    /// File name only
    Hidden,
}

impl PathFormat {
    /// Render `document` relative to `root`, with `/` separators
    pub fn display(&self, document: &Path, root: &Path) -> String {
        let relative = document.strip_prefix(root).unwrap_or(document);
        let path = relative.to_string_lossy().replace('\\', "/");

        match self {
            PathFormat::Full => path,
            PathFormat::Hidden => path.rsplit('/').next().unwrap_or_default().to_string(),
            PathFormat::Abbreviated => {
                let segments: Vec<&str> = path.split('/').collect();
                let last = segments.len().saturating_sub(1);
                segments
                    .iter()
                    .enumerate()
                    .map(|(i, segment)| {
                        if i > 0 && i < last {
                            segment.chars().next().map(String::from).unwrap_or_default()
                        } else {
                            segment.to_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("/")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EpicConfig {
    /// Increment suggested when appending to an epic
    pub seq_step: i64,
}

impl Default for EpicConfig {
    fn default() -> Self {
        Self { seq_step: 1 }
    }
}

impl Config {
    /// Parse config YAML. An empty document yields the defaults.
    ///
    /// Workspace globs are compiled here so that a bad pattern is a config
    /// error rather than a failure later in the scan or the watcher.
    pub fn parse(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(yaml)?;
        config
            .filter(Path::new(""))
            .wrap_err("Invalid workspace file patterns")?;
        Ok(config)
    }

    /// Load the config file at `path`; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content)
                .wrap_err_with(|| format!("Config file {} has errors", path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e)
                .wrap_err_with(|| format!("Config file {} not readable", path.display())),
        }
    }

    /// The default tags with this config's overrides merged on top
    pub fn registry(&self) -> TagRegistry {
        let mut registry = TagRegistry::with_defaults();
        registry.set_display_line_number(self.tags.display_line_number);
        registry.merge(&self.tags.list);
        registry
    }

    /// Build the parser (and its matcher) described by this config
    pub fn parser(&self) -> Result<Parser, ConfigError> {
        Parser::new(
            self.registry(),
            &self.tags.separators,
            &self.tags.end_tag,
            self.tags.match_case,
            ParseOptions {
                show_tag_name: self.tags.show_tag_name,
            },
        )
    }

    /// Include/exclude filter for documents under `project_root`
    pub fn filter(&self, project_root: &Path) -> Result<PathFilter> {
        PathFilter::new(
            project_root,
            &self.workspace.match_files,
            &self.workspace.exclude_files,
        )
    }

    /// Document enumerator for the workspace under `project_root`
    pub fn walker(&self, project_root: &Path) -> WalkSources {
        WalkSources::new(project_root)
            .include(self.workspace.match_files.iter().cloned())
            .exclude(self.workspace.exclude_files.iter().cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anchors_core::{Behavior, IconColor, Scope};
    use indoc::indoc;

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(Config::parse("").unwrap(), Config::default());
        assert_eq!(Config::parse("  \n").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config = Config::parse(indoc! {"
            workspace:
              max_files: 10
            parse_delay_ms: 100
        "})
        .unwrap();
        assert_eq!(config.workspace.max_files, 10);
        assert!(config.workspace.enabled);
        assert_eq!(config.parse_delay_ms, 100);
        assert_eq!(config.tags.end_tag, "!");
        assert_eq!(config.epic.seq_step, 1);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::parse("tagz: {}\n").is_err());
    }

    #[test]
    fn test_tag_overrides_merge() {
        let config = Config::parse(indoc! {"
            tags:
              display_line_number: false
              list:
                - tag: todo
                  scope: document
                - tag: NOTE
                  enabled: false
                - tag: HACK
                  highlight_color: '#ff0000'
                  display_line_number: true
                - tag: BLOCK
                  is_region: true
                  icon_color: not-a-color
        "})
        .unwrap();
        let registry = config.registry();

        assert_eq!(registry.get("TODO").unwrap().scope, Scope::Document);
        assert!(!registry.contains("NOTE"));
        assert!(!registry.get("FIXME").unwrap().display_line_number);

        let hack = registry.get("HACK").unwrap();
        assert_eq!(hack.scope, Scope::Workspace);
        assert!(hack.display_line_number);
        assert_eq!(hack.icon_color, IconColor::Hex("ff0000".into()));

        let block = registry.get("BLOCK").unwrap();
        assert_eq!(block.behavior, Behavior::Region);
        assert_eq!(block.icon_color, IconColor::Auto);
    }

    #[test]
    fn test_parser_rejects_empty_separators() {
        let mut config = Config::default();
        config.tags.separators.clear();
        assert!(matches!(config.parser(), Err(ConfigError::NoSeparators)));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&default_config_path(dir.path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "workspace: [").unwrap();
        let err = Config::load(&path).unwrap_err();
        assert!(format!("{}", err).contains("has errors"));
    }

    #[test]
    fn test_bad_glob_is_a_config_error() {
        let err = Config::parse("workspace:\n  match_files: ['src/[bad']\n").unwrap_err();
        assert!(format!("{:#}", err).contains("Invalid workspace file patterns"));
        assert!(Config::parse("workspace:\n  exclude_files: ['{a,b']\n").is_err());
    }

    #[test]
    fn test_path_formats() {
        let root = Path::new("/repo");
        let doc = Path::new("/repo/src/util/strings.rs");
        assert_eq!(PathFormat::Full.display(doc, root), "src/util/strings.rs");
        assert_eq!(
            PathFormat::Abbreviated.display(doc, root),
            "src/u/strings.rs"
        );
        let deep = Path::new("/repo/crates/core/src/lib.rs");
        assert_eq!(
            PathFormat::Abbreviated.display(deep, root),
            "crates/c/s/lib.rs"
        );
        assert_eq!(PathFormat::Hidden.display(doc, root), "strings.rs");
    }
}
