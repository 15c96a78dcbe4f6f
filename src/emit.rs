//! Writing generated scripts to `<out-dir>/scripts/` and referencing them
//! from HTML documents.

use std::fs;
use std::path::{Path, PathBuf};

use crate::codegen::{generate_registry_js, generate_scope_js, generate_store_js};
use crate::registry::GlobalStateRegistry;
use crate::store::ScopedStateStore;
use crate::utils::sanitize_file_token;
use crate::{StateConfiguration, StateError, StateScope};

pub const SCRIPTS_DIR: &str = "scripts";
pub const SCRIPT_MARKER_ATTR: &str = "data-webui-state-script";

/// Where a generated script belongs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptTarget {
    /// One scope of a store.
    Scope(StateScope),
    /// A page, addressed by its document path (`/docs/intro`).
    Document(String),
    /// A component-local script, addressed by component ID.
    Local(String),
    /// Every scope in a single file.
    Combined,
}

impl ScriptTarget {
    pub fn file_name(&self) -> String {
        match self {
            ScriptTarget::Scope(scope) => format!("state-{}.js", scope),
            ScriptTarget::Document(path) => {
                let trimmed = path.trim_matches('/');
                if trimmed.is_empty() {
                    "state-index.js".to_string()
                } else {
                    format!("state-{}.js", sanitize_file_token(trimmed))
                }
            }
            ScriptTarget::Local(id) => format!("state-local-{}.js", sanitize_file_token(id)),
            ScriptTarget::Combined => "state.js".to_string(),
        }
    }

    /// Site-absolute URL of the emitted script.
    pub fn script_src(&self) -> String {
        format!("/{}/{}", SCRIPTS_DIR, self.file_name())
    }
}

/// Write `js` for `target` under `out_dir/scripts/`, returning the path.
pub fn write_script(out_dir: &Path, target: &ScriptTarget, js: &str) -> Result<PathBuf, StateError> {
    let dir = out_dir.join(SCRIPTS_DIR);
    fs::create_dir_all(&dir)?;
    let path = dir.join(target.file_name());
    fs::write(&path, js)?;
    tracing::debug!(path = %path.display(), bytes = js.len(), "wrote state script");
    Ok(path)
}

/// Emit the scripts for `store`: one per non-empty scope, or a single
/// `state.js` when `combined`. Returns the targets written, in scope order.
pub fn emit_store_scripts(
    store: &ScopedStateStore,
    out_dir: &Path,
    config: &StateConfiguration,
    combined: bool,
) -> Result<Vec<ScriptTarget>, StateError> {
    if combined {
        let target = ScriptTarget::Combined;
        write_script(out_dir, &target, &generate_store_js(store, config))?;
        return Ok(vec![target]);
    }

    let mut written = Vec::new();
    for scope in StateScope::ALL {
        if store.keys(scope).is_empty() {
            continue;
        }
        let target = ScriptTarget::Scope(scope);
        write_script(out_dir, &target, &generate_scope_js(store, scope, config))?;
        written.push(target);
    }
    Ok(written)
}

/// Emit the registry snapshot as the script for one document.
pub fn emit_document_script(
    registry: &GlobalStateRegistry,
    document_path: &str,
    out_dir: &Path,
    config: &StateConfiguration,
) -> Result<ScriptTarget, StateError> {
    let target = ScriptTarget::Document(document_path.to_string());
    write_script(out_dir, &target, &generate_registry_js(registry, config))?;
    Ok(target)
}

/// Wrap a fragment in a minimal document so scripts have a `</body>` to
/// land before.
pub fn ensure_document_html(fragment_or_doc: &str) -> String {
    if fragment_or_doc.contains("<html") {
        return fragment_or_doc.to_string();
    }
    format!(
        "<!DOCTYPE html><html><head></head><body>{}</body></html>",
        fragment_or_doc
    )
}

/// Reference `script_src` from `html` unless it already does.
pub fn inject_script_once(html: &str, script_src: &str) -> String {
    if html.contains(script_src) {
        return html.to_string();
    }
    let script_tag = format!("<script src=\"{script_src}\" defer {SCRIPT_MARKER_ATTR}></script>");
    if html.contains("</body>") {
        return html.replacen("</body>", &format!("{script_tag}</body>"), 1);
    }
    format!("{html}{script_tag}")
}

/// Reference every emitted target from `html`, in order.
pub fn inject_scripts(html: &str, targets: &[ScriptTarget]) -> String {
    targets
        .iter()
        .fold(ensure_document_html(html), |doc, target| {
            inject_script_once(&doc, &target.script_src())
        })
}
