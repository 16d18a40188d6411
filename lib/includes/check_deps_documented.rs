// Copyright 2020 - developers of the `grammers` project.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.
use std::collections::BTreeSet;
use std::fs;

const DEPENDENCY_TABLES: [&str; 3] = ["dependencies", "build-dependencies", "dev-dependencies"];

/// Names of every dependency in a manifest, including target-specific ones.
fn manifest_deps(manifest: &toml::Table) -> BTreeSet<String> {
    let mut tables = vec![manifest];
    if let Some(toml::Value::Table(targets)) = manifest.get("target") {
        tables.extend(targets.values().filter_map(toml::Value::as_table));
    }

    tables
        .into_iter()
        .flat_map(|table| {
            DEPENDENCY_TABLES
                .iter()
                .filter_map(|&key| table.get(key).and_then(toml::Value::as_table))
        })
        .flat_map(|deps| deps.keys().cloned())
        .collect()
}

#[test]
fn check_deps_documented() {
    let manifest = fs::read_to_string("Cargo.toml").expect("Cargo.toml must exist");
    let manifest = manifest
        .parse::<toml::Table>()
        .expect("Cargo.toml should not be malformed");
    let listed = manifest_deps(&manifest);

    let markdown = fs::read_to_string("DEPS.md").expect("DEPS.md must exist");
    let documented = markdown
        .lines()
        .filter_map(|line| line.strip_prefix("## "))
        .map(|name| name.trim().to_string())
        .collect::<BTreeSet<_>>();

    let undocumented = listed.difference(&documented).collect::<Vec<_>>();
    assert!(
        undocumented.is_empty(),
        "some Cargo.toml dependencies are not in DEPS.md: {undocumented:?}"
    );

    let stale = documented.difference(&listed).collect::<Vec<_>>();
    assert!(
        stale.is_empty(),
        "DEPS.md lists dependencies no longer present in Cargo.toml: {stale:?}"
    );
}
