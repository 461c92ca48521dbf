//! Flux files: input discovery and entry loading.
//!
//! A flux file is a JSON document holding an entry list (default key
//! `dk2nuTree`) and metadata (default key `dkmetaTree`) with the protons on
//! target under `pots`:
//!
//! ```json
//! {"dkmetaTree": {"pots": 5.0e5}, "dk2nuTree": [{"decay": {...}, "nuray": [...]}]}
//! ```
//!
//! The metadata may also be a list of records whose POT are summed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use fr_core::{Error, Result};
use globset::Glob;
use serde_json::Value;

use crate::event::FluxEvent;

/// Default entry list key.
pub const DEFAULT_TREE: &str = "dk2nuTree";
/// Default metadata key.
pub const DEFAULT_META: &str = "dkmetaTree";
/// Default POT key inside the metadata.
pub const DEFAULT_POT: &str = "pots";

/// Where entries and POT live inside a flux file, and renamed branches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    /// Entry list key.
    pub tree: String,
    /// Metadata key.
    pub meta: String,
    /// POT key inside the metadata.
    pub pot: String,
    /// Standard branch name -> name used in the file.
    pub overrides: BTreeMap<String, String>,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            tree: DEFAULT_TREE.into(),
            meta: DEFAULT_META.into(),
            pot: DEFAULT_POT.into(),
            overrides: BTreeMap::new(),
        }
    }
}

impl SourceLayout {
    /// Whether this is the standard dk2nu layout.
    pub fn is_standard(&self) -> bool {
        *self == Self::default()
    }
}

/// Files matching `pattern`, sorted.
///
/// Only the final path component may contain wildcards (`*`, `?`, `[..]`,
/// `{a,b}`). A pattern without wildcards names one file, which must exist.
pub fn expand_pattern(pattern: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(pattern);
    let Some(file_glob) = path.file_name().and_then(|f| f.to_str()) else {
        return Err(Error::Config(format!("input pattern '{pattern}' names no file")));
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    if !file_glob.contains(['*', '?', '[', '{']) {
        return Ok(if path.is_file() { vec![path.to_path_buf()] } else { Vec::new() });
    }

    let matcher = Glob::new(file_glob)
        .map_err(|e| Error::Config(format!("bad input pattern '{pattern}': {e}")))?
        .compile_matcher();

    let mut files = Vec::new();
    let entries = match std::fs::read_dir(&dir) {
        Ok(e) => e,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e.into()),
    };
    for entry in entries {
        let entry = entry?;
        let p = entry.path();
        if p.is_file() && entry.file_name().to_str().is_some_and(|n| matcher.is_match(n)) {
            files.push(p);
        }
    }
    files.sort();
    Ok(files)
}

/// One loaded flux file.
#[derive(Debug, Clone)]
pub struct FluxFile {
    /// Where it was read from.
    pub path: PathBuf,
    /// Protons on target recorded in the metadata.
    pub pot: f64,
    /// Entries in file order.
    pub entries: Vec<FluxEvent>,
}

impl FluxFile {
    /// Read and parse `path`.
    pub fn open(path: impl AsRef<Path>, layout: &SourceLayout) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::Io(std::io::Error::new(e.kind(), format!("{}: {e}", path.display())))
        })?;
        let mut doc: Value = serde_json::from_str(&text)?;
        let mut file = Self::from_value(&mut doc, layout)
            .map_err(|e| Error::Validation(format!("{}: {e}", path.display())))?;
        file.path = path.to_path_buf();
        Ok(file)
    }

    /// Parse an already-decoded document.
    pub fn from_value(doc: &mut Value, layout: &SourceLayout) -> Result<Self> {
        let pot = read_pot(doc, layout)?;
        let Some(tree) = doc.get_mut(&layout.tree).map(Value::take) else {
            return Err(Error::NotFound(format!("entry list '{}'", layout.tree)));
        };
        let Value::Array(mut raw) = tree else {
            return Err(Error::Validation(format!("'{}' is not a list of entries", layout.tree)));
        };
        if !layout.overrides.is_empty() {
            for entry in &mut raw {
                apply_overrides(entry, &layout.overrides);
            }
        }
        let entries = raw
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<FluxEvent>, _>>()?;
        Ok(Self { path: PathBuf::new(), pot, entries })
    }
}

fn read_pot(doc: &Value, layout: &SourceLayout) -> Result<f64> {
    let missing = || Error::NotFound(format!("POT '{}/{}'", layout.meta, layout.pot));
    let pot_of = |record: &Value| record.get(&layout.pot).and_then(Value::as_f64);
    match doc.get(&layout.meta) {
        Some(Value::Array(records)) => {
            records.iter().map(|r| pot_of(r).ok_or_else(missing)).sum::<Result<f64>>()
        }
        Some(record) => pot_of(record).ok_or_else(missing),
        None => Err(missing()),
    }
}

/// Move each renamed field of `entry` to its standard place.
///
/// Names are dotted paths (`"decay.ntype"`); a list along the path applies the
/// move to every element (`"nuray.E"` renames the field in every ray).
fn apply_overrides(entry: &mut Value, overrides: &BTreeMap<String, String>) {
    for (standard, renamed) in overrides {
        let (Some((std_obj, std_field)), Some((ren_obj, ren_field))) =
            (standard.rsplit_once('.'), renamed.rsplit_once('.'))
        else {
            // top-level field
            if let Some(obj) = entry.as_object_mut()
                && let Some(v) = obj.remove(renamed)
            {
                obj.insert(standard.clone(), v);
            }
            continue;
        };
        if std_obj != ren_obj {
            log::warn!("cannot move '{renamed}' to '{standard}': different parents");
            continue;
        }
        move_field(entry, std_obj, ren_field, std_field);
    }
}

fn move_field(entry: &mut Value, parent: &str, from: &str, to: &str) {
    let mut node = entry;
    for key in parent.split('.') {
        match node.get_mut(key) {
            Some(n) => node = n,
            None => return,
        }
    }
    let mut rename = |obj: &mut Value| {
        if let Some(map) = obj.as_object_mut()
            && let Some(v) = map.remove(from)
        {
            map.insert(to.to_string(), v);
        }
    };
    match node {
        Value::Array(items) => items.iter_mut().for_each(rename),
        other => rename(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_entries_and_pot() {
        let mut doc = json!({
            "dkmetaTree": {"pots": 1.5e5},
            "dk2nuTree": [{"decay": {"ntype": 14, "nimpwt": 1.0}, "nuray": [{"E": 1.0, "wgt": 0.1}]}]
        });
        let f = FluxFile::from_value(&mut doc, &SourceLayout::default()).unwrap();
        assert_eq!(f.pot, 1.5e5);
        assert_eq!(f.entries.len(), 1);
        assert_eq!(f.entries[0].decay.ntype, 14);
    }

    #[test]
    fn sums_pot_over_meta_records() {
        let mut doc = json!({"meta": [{"pot": 1.0}, {"pot": 2.5}], "tree": []});
        let layout = SourceLayout {
            tree: "tree".into(),
            meta: "meta".into(),
            pot: "pot".into(),
            ..SourceLayout::default()
        };
        assert!(!layout.is_standard());
        assert_eq!(FluxFile::from_value(&mut doc, &layout).unwrap().pot, 3.5);

        let mut no_pot = json!({"meta": {}, "tree": []});
        assert!(matches!(FluxFile::from_value(&mut no_pot, &layout), Err(Error::NotFound(_))));
    }

    #[test]
    fn renamed_branches_are_moved() {
        let mut layout = SourceLayout::default();
        layout.overrides.insert("decay.ntype".into(), "decay.nu_pdg".into());
        layout.overrides.insert("nuray.E".into(), "nuray.energy".into());
        let mut doc = json!({
            "dkmetaTree": {"pots": 1.0},
            "dk2nuTree": [{"decay": {"nu_pdg": 12}, "nuray": [{"energy": 3.0}, {"energy": 4.0}]}]
        });
        let f = FluxFile::from_value(&mut doc, &layout).unwrap();
        assert_eq!(f.entries[0].decay.ntype, 12);
        assert_eq!(f.entries[0].ray(1).energy, 4.0);
    }

    #[test]
    fn pattern_expansion() {
        let mut dir = std::env::temp_dir();
        dir.push(format!("fr-source-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for name in ["b.json", "a.json", "c.txt"] {
            std::fs::write(dir.join(name), "{}").unwrap();
        }

        let pattern = format!("{}/*.json", dir.display());
        let found = expand_pattern(&pattern).unwrap();
        assert_eq!(found, [dir.join("a.json"), dir.join("b.json")]);

        let exact = format!("{}/c.txt", dir.display());
        assert_eq!(expand_pattern(&exact).unwrap().len(), 1);
        let missing = format!("{}/none/*.json", dir.display());
        assert!(expand_pattern(&missing).unwrap().is_empty());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
