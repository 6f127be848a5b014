//! File templates for scaffolded sources, docs and stubs.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use minijinja::{Environment, context};

use crate::core::types::WorkItem;

const MODULE_TEMPLATE: &str = include_str!("templates/module.rs.j2");
const DOC_TEMPLATE: &str = include_str!("templates/doc.md.j2");
const STUB_TEMPLATE: &str = include_str!("templates/stub.rs.j2");
const PLAIN_TEMPLATE: &str = include_str!("templates/plain.txt.j2");

static ENGINE: LazyLock<Environment<'static>> = LazyLock::new(|| {
    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    env.add_template("module.rs", MODULE_TEMPLATE)
        .expect("module template should be valid");
    env.add_template("doc.md", DOC_TEMPLATE)
        .expect("doc template should be valid");
    env.add_template("stub.rs", STUB_TEMPLATE)
        .expect("stub template should be valid");
    env.add_template("plain.txt", PLAIN_TEMPLATE)
        .expect("plain template should be valid");
    env
});

/// Initial contents for a scaffolded file, chosen by extension.
pub(crate) fn render_scaffold(target: &Path, item: &WorkItem) -> Result<String> {
    let name = match target.extension().and_then(|ext| ext.to_str()) {
        Some("rs") => "module.rs",
        Some("md") => "doc.md",
        _ => "plain.txt",
    };
    let title = target
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("untitled");
    let rendered = ENGINE.get_template(name)?.render(context! {
        title => title,
        phase => item.phase_name.as_str(),
        item => item.text.as_str(),
    })?;
    Ok(rendered)
}

/// Source stub declaring a single placeholder type.
pub(crate) fn render_stub(slug: &str, type_name: &str, item: &WorkItem) -> Result<String> {
    let rendered = ENGINE.get_template("stub.rs")?.render(context! {
        title => slug,
        type_name => type_name,
        item => item.text.as_str(),
    })?;
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ItemStatus;

    fn item(text: &str) -> WorkItem {
        WorkItem {
            phase_id: "core".to_string(),
            phase_name: "Core".to_string(),
            phase_index: 0,
            index_in_phase: 0,
            text: text.to_string(),
            future: false,
            status: ItemStatus::Todo,
        }
    }

    #[test]
    fn scaffold_template_follows_extension() {
        let item = item("Create src/engine.rs skeleton");
        let rust = render_scaffold(Path::new("src/engine.rs"), &item).expect("render");
        assert_eq!(
            rust,
            "//! engine\n//!\n//! Scaffolded from roadmap phase `Core`: Create src/engine.rs skeleton\n"
        );
        let doc = render_scaffold(Path::new("docs/overview.md"), &item).expect("render");
        assert!(doc.starts_with("# overview\n"));
        let other = render_scaffold(Path::new("tests/data.csv"), &item).expect("render");
        assert_eq!(other, "Create src/engine.rs skeleton\n");
    }

    #[test]
    fn stub_declares_type() {
        let out = render_stub("config_loader", "ConfigLoader", &item("Build config loader stub"))
            .expect("render");
        assert!(out.contains("pub struct ConfigLoader;"));
        assert!(out.ends_with('\n'));
    }
}
