//! Generate source stubs or JSON Schema data definitions.
//!
//! Items that talk about schemas, definitions, records or payloads get a
//! schema file; everything else gets a Rust stub. Existing files are kept.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};
use tracing::{debug, info};

use super::naming::{camel_case, rust_ident, slug};
use super::templates::render_stub;
use super::{Handler, settle};
use crate::core::scorer::{has_stem, words};
use crate::core::types::{HandlerResult, WorkItem};

const SCHEMA_STEMS: &[&str] = &["schema", "defin", "record", "payload", "format"];
const MAX_NAME_WORDS: usize = 4;

#[derive(Debug, Clone)]
pub struct BuildHandler {
    stub_dir: PathBuf,
    schema_dir: PathBuf,
}

/// What a build item turns into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildKind {
    Stub,
    Schema,
}

impl BuildHandler {
    pub fn new(stub_dir: PathBuf, schema_dir: PathBuf) -> Self {
        Self {
            stub_dir,
            schema_dir,
        }
    }

    pub fn kind(text: &str) -> BuildKind {
        let lower = text.to_lowercase();
        if has_stem(&words(&lower), SCHEMA_STEMS) {
            BuildKind::Schema
        } else {
            BuildKind::Stub
        }
    }

    fn build(&self, item: &WorkItem) -> Result<HandlerResult> {
        match Self::kind(&item.text) {
            BuildKind::Schema => self.write_schema(item),
            BuildKind::Stub => self.write_stub(item),
        }
    }

    fn write_schema(&self, item: &WorkItem) -> Result<HandlerResult> {
        let name = slug(&item.text, "-", MAX_NAME_WORDS)
            .ok_or_else(|| anyhow!("cannot name schema for: {}", item.text))?;
        let path = self.schema_dir.join(format!("{name}.schema.json"));
        if path.exists() {
            debug!(path = %path.display(), "schema exists, skipping");
            return Ok(HandlerResult::ok(format!("exists: {}", path.display())));
        }

        let schema = data_definition(&name, &item.text);
        jsonschema::validator_for(&schema)
            .map_err(|err| anyhow!("generated schema does not compile: {}", err))?;

        fs::create_dir_all(&self.schema_dir)
            .with_context(|| format!("create directory {}", self.schema_dir.display()))?;
        let mut buf = serde_json::to_string_pretty(&schema).context("serialize schema")?;
        buf.push('\n');
        fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "wrote data definition");
        Ok(HandlerResult::ok(format!("created {}", path.display())))
    }

    fn write_stub(&self, item: &WorkItem) -> Result<HandlerResult> {
        let name = slug(&item.text, "_", MAX_NAME_WORDS)
            .map(|slug| rust_ident(&slug, "stub"))
            .ok_or_else(|| anyhow!("cannot name stub for: {}", item.text))?;
        let path = self.stub_dir.join(format!("{name}.rs"));
        if path.exists() {
            debug!(path = %path.display(), "stub exists, skipping");
            return Ok(HandlerResult::ok(format!("exists: {}", path.display())));
        }

        let contents = render_stub(&name, &camel_case(&name), item)?;
        fs::create_dir_all(&self.stub_dir)
            .with_context(|| format!("create directory {}", self.stub_dir.display()))?;
        fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        info!(path = %path.display(), "wrote source stub");
        Ok(HandlerResult::ok(format!("created {}", path.display())))
    }
}

impl Handler for BuildHandler {
    fn execute(&self, item: &WorkItem) -> HandlerResult {
        settle(self.build(item))
    }
}

/// Open object schema: a starting point for a human to tighten.
fn data_definition(name: &str, description: &str) -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": format!("{name}.schema.json"),
        "title": camel_case(name),
        "description": description,
        "type": "object",
        "properties": {},
        "additionalProperties": true
    })
}
