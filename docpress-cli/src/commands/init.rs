//! Init command implementation.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG: &str = include_str!("../../../docpress.yml.example");

/// Initialize a new docpress project
pub fn init_project(path: Option<&Path>) -> Result<()> {
    let root = path.unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(root).with_context(|| format!("Failed to create {:?}", root))?;

    write_config(root)?;
    scaffold_content(root)?;

    println!("docpress initialized in {:?}", root);
    println!("  - Edit docpress.yml to customize site metadata");
    println!("  - Write posts in content/ and put images in assets/");
    Ok(())
}

fn write_config(root: &Path) -> Result<()> {
    let config_path = root.join("docpress.yml");
    if config_path.exists() {
        println!("docpress.yml already exists at {:?}", config_path);
        return Ok(());
    }

    fs::write(&config_path, DEFAULT_CONFIG)
        .with_context(|| format!("Failed to write {:?}", config_path))?;
    println!("Created {:?}", config_path);
    Ok(())
}

fn scaffold_content(root: &Path) -> Result<()> {
    let content = root.join("content");
    let assets = root.join("assets");
    let drafts = content.join("drafts");

    for dir in [&content, &assets, &drafts] {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
    }

    let sample = content.join("welcome.md");
    if !sample.exists() {
        fs::write(&sample, sample_post())?;
        println!("Created {:?}", sample);
    }

    Ok(())
}

fn sample_post() -> String {
    r#"---
title: Welcome to docpress
date: 2024-01-01
tags: [meta]
description: What a post can contain
---

# Welcome

Posts are Markdown with a YAML header. Code blocks are highlighted and can
carry callouts:

```rust
fn main() {
    println!("hello"); // <1>
}
```
1. Printed once per run

Set `draft: true` to keep a post out of the build, or give it a future
`date` to schedule it.
"#
    .to_string()
}
