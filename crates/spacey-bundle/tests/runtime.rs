// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Executes emitted bundles with `node` to check the runtime loader.
//!
//! Every test returns early when `node` is not installed.

mod common;

use common::{node_available, run_node, write_tree};
use spacey_bundle::resolver::join;
use spacey_bundle::{BundleEmitter, Bundler, Config, ModuleId, RewrittenModule};
use tempfile::tempdir;

async fn run_bundle(files: &[(&str, &str)]) -> Option<Result<String, String>> {
    if !node_available() {
        eprintln!("node not found, skipping");
        return None;
    }

    let dir = tempdir().unwrap();
    write_tree(dir.path(), files);
    let config = Config {
        cache: Some(dir.path().join("cache")),
        fetch: false,
        ..Config::default()
    };
    let bundle = Bundler::new(&config, dir.path())
        .unwrap()
        .bundle(files[0].0)
        .await
        .unwrap();

    Some(run_node(dir.path(), &bundle.code))
}

/// Emit hand-written module bodies around the loader and run them.
fn run_emitted(entry: &str, modules: &[(&str, &str)]) -> Option<Result<String, String>> {
    if !node_available() {
        eprintln!("node not found, skipping");
        return None;
    }

    let modules: Vec<(ModuleId, RewrittenModule)> = modules
        .iter()
        .map(|(id, code)| {
            let module = RewrittenModule {
                code: code.to_string(),
                uses_merge_helper: false,
            };
            (ModuleId::new(*id), module)
        })
        .collect();
    let code = BundleEmitter::default()
        .emit(&ModuleId::new(entry), modules.iter().map(|(id, m)| (id, m)))
        .unwrap();

    let dir = tempdir().unwrap();
    Some(run_node(dir.path(), &code))
}

#[tokio::test]
async fn test_named_and_renamed_imports() {
    let Some(result) = run_bundle(&[
        ("main.ts", "import { a, b as B } from './m.ts';\nconsole.log(a === 1 && B === 2);\n"),
        ("m.ts", "export const a = 1;\nconst b = 2;\nexport { b };\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "true");
}

#[tokio::test]
async fn test_cycle_shares_one_exports_object() {
    let Some(result) = run_bundle(&[
        ("a.ts", "import * as b from './b.ts';\nexport const a = 1;\nconsole.log(b.getA());\n"),
        ("b.ts", "import * as a from './a.ts';\nexport function getA() { return a.a; }\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "1");
}

#[tokio::test]
async fn test_module_body_runs_once() {
    let Some(result) = run_bundle(&[
        ("main.ts", "import './counter.ts';\nimport './other.ts';\nconsole.log(globalThis.runs);\n"),
        ("other.ts", "import './counter.ts';\n"),
        ("counter.ts", "globalThis.runs = (globalThis.runs || 0) + 1;\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "1");
}

#[tokio::test]
async fn test_poisoned_module_is_not_rerun() {
    let Some(result) = run_bundle(&[
        (
            "main.ts",
            "import('./bad.ts')\n  .catch((e) => { console.log('first:' + e.message); return import('./bad.ts'); })\n  .then((m) => console.log('second:' + m.x + ':' + globalThis.runs));\n",
        ),
        (
            "bad.ts",
            "globalThis.runs = (globalThis.runs || 0) + 1;\nexport const x = 1;\nthrow new Error('boom');\n",
        ),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "first:boom\nsecond:1:1");
}

#[tokio::test]
async fn test_reexports_and_defaults() {
    let Some(result) = run_bundle(&[
        (
            "main.ts",
            "import * as ns from './re.ts';\nimport greet from './greet.ts';\nconsole.log(Object.keys(ns).sort().join(','), greet());\n",
        ),
        ("re.ts", "export * from './xy.ts';\nexport { x as renamed } from './xy.ts';\nexport const own = 1;\n"),
        ("xy.ts", "export const x = 1;\nexport const y = 2;\n"),
        ("greet.ts", "export default function greet() { return 'hi'; }\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "own,renamed,x,y hi");
}

#[tokio::test]
async fn test_import_meta() {
    let Some(result) = run_bundle(&[
        ("main.ts", "import './lib.ts';\nconsole.log(import.meta.url, import.meta.main);\n"),
        ("lib.ts", "console.log(import.meta.url, import.meta.main);\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "./lib.ts false\n./main.ts true");
}

#[tokio::test]
async fn test_computed_dynamic_import_resolves_relative_to_module() {
    let Some(result) = run_bundle(&[
        (
            "main.ts",
            "import './lang/index.ts';\nconst name = 'en';\nimport(`./lang/${name}.ts`).then((m) => console.log(m.hello));\n",
        ),
        ("lang/index.ts", "export const en = () => import('./en.ts');\n"),
        ("lang/en.ts", "export const hello = 'hello';\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "hello");
}

#[tokio::test]
async fn test_cycle_sees_exports_object_while_evaluating() {
    let Some(result) = run_bundle(&[
        (
            "main.ts",
            "import * as a from './a.ts';\nconsole.log(globalThis.seenByB === a, globalThis.keysSeenByB, a.a);\n",
        ),
        ("a.ts", "import './b.ts';\nexport const a = 1;\n"),
        (
            "b.ts",
            "import * as a from './a.ts';\nglobalThis.seenByB = a;\nglobalThis.keysSeenByB = Object.keys(a).join(',') || 'none';\n",
        ),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "true none 1");
}

#[tokio::test]
async fn test_typescript_only_syntax_runs() {
    let Some(result) = run_bundle(&[
        (
            "main.ts",
            "import { Color, add } from './lib.ts';\nimport type { Shape } from './lib.ts';\nconst s: Shape = { sides: add(1, 2) };\nconsole.log(Color.Green, Color[Color.Red], s.sides);\n",
        ),
        (
            "lib.ts",
            "export enum Color { Red, Green }\nexport interface Shape { sides: number }\nexport function add(a: number, b: number): number {\n  return a + b;\n}\n",
        ),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "1 Red 3");
}

#[tokio::test]
async fn test_dynamic_import_outside_bundle_uses_host_import() {
    let Some(result) = run_bundle(&[
        (
            "main.ts",
            "const name = 'outside';\nimport(`./${name}.mjs`).then((m) => console.log(m.value));\n",
        ),
        ("outside.mjs", "export const value = 'from disk';\n"),
    ])
    .await
    else {
        return;
    };
    assert_eq!(result.unwrap(), "from disk");
}

#[test]
fn test_resolve_module_matches_build_time_join() {
    let pairs = [
        ("https://host/a/b.ts", "../c.ts"),
        ("https://host/a/b.ts", "../../../c.ts"),
        ("https://host/a/b.ts", "https://other.test/x/../y.ts#frag"),
        ("./main.ts", "https://H.test:443/./z.ts"),
        ("./src/main.ts", "../../lib/a.ts"),
        ("./main.ts", "./x/./y/../z.ts"),
    ];
    let body: String = pairs
        .iter()
        .map(|(parent, dep)| {
            format!(
                "console.log(__bundle.resolveModule({}, {}));\n",
                serde_json::to_string(parent).unwrap(),
                serde_json::to_string(dep).unwrap()
            )
        })
        .collect();

    let Some(result) = run_emitted("./main.ts", &[("./main.ts", &body)]) else {
        return;
    };

    let expected: Vec<String> = pairs
        .iter()
        .map(|(parent, dep)| join(parent, dep).unwrap().to_string())
        .collect();
    assert_eq!(result.unwrap(), expected.join("\n"));
}

#[test]
fn test_missing_module_error_names_importer() {
    let Some(result) = run_emitted(
        "./main.ts",
        &[(
            "./main.ts",
            "try { __bundle.import(\"./ghost.ts\"); } catch (e) { console.log(e.message); }\n",
        )],
    ) else {
        return;
    };
    assert_eq!(
        result.unwrap(),
        "module './ghost.ts' is not in this bundle (imported from './main.ts')"
    );
}
