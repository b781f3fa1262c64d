//! Rule Set Loading

use crate::{Rule, RuleLoadError, UnitSystem};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

/// Where rules come from
#[derive(Debug, Clone)]
pub enum RuleSource {
    /// Rules built in code
    Rules(Vec<Rule>),
    /// Directory of `*.yaml` / `*.yml` declarations, one rule per file
    Directory(PathBuf),
}

/// Options applied while validating a rule set
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadOptions {
    /// Unit system the rules will be evaluated in
    pub units: UnitSystem,
}

/// Load and validate a complete rule set
pub fn load_rules(source: RuleSource, options: &LoadOptions) -> Result<RuleSet, RuleLoadError> {
    match source {
        RuleSource::Rules(rules) => RuleSet::from_rules(rules, options),
        RuleSource::Directory(dir) => RuleSet::from_dir(dir, options),
    }
}

/// Validated, ordered set of rules with unique names and flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Validate rules in order; the first problem aborts the load
    pub fn from_rules(rules: Vec<Rule>, options: &LoadOptions) -> Result<Self, RuleLoadError> {
        let mut names: HashSet<&str> = HashSet::with_capacity(rules.len());
        let mut flags: HashMap<&str, &str> = HashMap::with_capacity(rules.len());

        for rule in &rules {
            if !names.insert(rule.name()) {
                return Err(RuleLoadError::DuplicateName(rule.name().to_string()));
            }
            if let Some(first) = flags.insert(rule.flag_name(), rule.name()) {
                return Err(RuleLoadError::DuplicateFlag {
                    flag: rule.flag_name().to_string(),
                    rule: rule.name().to_string(),
                    first: first.to_string(),
                });
            }
            rule.bounds_for(options.units)?;
            rule.check_params(options.units, &Default::default())?;
        }

        info!("Loaded {} rules ({} units)", rules.len(), options.units);
        Ok(Self { rules })
    }

    /// Load every declaration in a directory, in sorted file-name order
    pub fn from_dir(dir: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, RuleLoadError> {
        let dir = dir.as_ref();
        let mut rules = Vec::new();

        for path in declaration_files(dir)? {
            let text = fs::read_to_string(&path).map_err(|source| RuleLoadError::Io {
                path: path.clone(),
                source,
            })?;
            let rule = Rule::from_yaml_with_origin(&text, &path.display().to_string())?;
            debug!("Read rule '{}' from {}", rule.name(), path.display());
            rules.push(rule);
        }

        Self::from_rules(rules, options)
    }

    /// Rules in load order
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name() == name)
    }

    /// Rules applicable to the given equipment types
    pub fn for_equipment(&self, types: &[&str]) -> RuleSet {
        RuleSet {
            rules: self
                .rules
                .iter()
                .filter(|r| r.applies_to(types))
                .cloned()
                .collect(),
        }
    }

    pub fn flag_names(&self) -> Vec<&str> {
        self.rules.iter().map(Rule::flag_name).collect()
    }

    pub fn into_rules(self) -> Vec<Rule> {
        self.rules
    }
}

fn declaration_files(dir: &Path) -> Result<Vec<PathBuf>, RuleLoadError> {
    let io_error = |source| RuleLoadError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yaml" || e == "yml");
        if is_yaml && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Snapshot of a declaration directory: (file name, size, modification time)
type Fingerprint = Vec<(PathBuf, u64, Option<SystemTime>)>;

fn fingerprint(dir: &Path) -> Result<Fingerprint, RuleLoadError> {
    declaration_files(dir)?
        .into_iter()
        .map(|path| {
            let meta = fs::metadata(&path).map_err(|source| RuleLoadError::Io {
                path: path.clone(),
                source,
            })?;
            Ok((path, meta.len(), meta.modified().ok()))
        })
        .collect()
}

/// Reloads a declaration directory when its files change.
///
/// A reload that fails keeps the last good rule set.
#[derive(Debug)]
pub struct RuleDirWatcher {
    dir: PathBuf,
    options: LoadOptions,
    fingerprint: Fingerprint,
    rules: RuleSet,
}

impl RuleDirWatcher {
    pub fn new(dir: impl Into<PathBuf>, options: LoadOptions) -> Result<Self, RuleLoadError> {
        let dir = dir.into();
        let fingerprint = fingerprint(&dir)?;
        let rules = RuleSet::from_dir(&dir, &options)?;
        Ok(Self {
            dir,
            options,
            fingerprint,
            rules,
        })
    }

    /// Current rule set
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Reload if the directory changed; returns whether the rules were replaced
    pub fn refresh(&mut self) -> Result<bool, RuleLoadError> {
        let current = fingerprint(&self.dir)?;
        if current == self.fingerprint {
            return Ok(false);
        }

        let rules = RuleSet::from_dir(&self.dir, &self.options)?;
        info!("Reloaded {} rules from {}", rules.len(), self.dir.display());
        self.rules = rules;
        self.fingerprint = current;
        Ok(true)
    }
}
