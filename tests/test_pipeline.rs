//! Source trees on disk through pack, resolve, compile, decompile and unpack.

use std::fs;
use std::path::Path;

use moosrc::hir::{ExportTable, resolve};
use moosrc::image::{CompileOptions, DbImage, DecompileMode, compile, decompile};
use moosrc::project::{self, FlatLayout, FsLoader, SourceDb, pack, unpack};
use moosrc::FileId;
use moosrc::syntax::{parse, unparse};

const CORE: &str = r#"module core version "1.0.0";
exports @root, @wizard;
forward @wizard;
include "objects/root.moo";
include "objects/wizard.moo";
"#;

const ROOT: &str = r#"object @root
  name "Root Class";
  owner @wizard;
  flags read, fertile;
  property description [readable] = "";
  property aliases [readable, writable] = {};
  method describe(?who = player)
    // Tell `who` what this looks like.
    who:tell(this.description);
  endmethod
endobject
"#;

const WIZARD: &str = r#"object @wizard
  name "Wizard";
  parent @root;
  owner @wizard;
  flags player, programmer, wizard;
  property description inherited = "A wizard.";
  command "@who" (none, none, none) [executable]
    player:tell("You.");
  endcommand
endobject
"#;

fn write_core(dir: &Path) {
    fs::create_dir_all(dir.join("core/objects")).unwrap();
    fs::write(dir.join("core/module.moo"), CORE).unwrap();
    fs::write(dir.join("core/objects/root.moo"), ROOT).unwrap();
    fs::write(dir.join("core/objects/wizard.moo"), WIZARD).unwrap();
}

fn image_of(text: &str, first_object: i64) -> DbImage {
    let unit = parse(text, FileId::new(0)).unwrap_or_else(|e| panic!("{e}\n{text}"));
    let resolved = resolve(unit, &ExportTable::new()).unwrap_or_else(|e| panic!("{e}\n{text}"));
    let options = CompileOptions {
        first_object,
        ..CompileOptions::default()
    };
    compile(&resolved, &options).unwrap().image
}

#[test]
fn test_packed_tree_compiles_and_decompiles() {
    let dir = tempfile::tempdir().unwrap();
    write_core(dir.path());

    let unit = pack(&dir.path().join("core/module.moo"), &FsLoader).unwrap();
    assert_eq!(unit.objects().count(), 2);
    let resolved = resolve(unit, &ExportTable::new()).unwrap();
    let options = CompileOptions {
        first_object: 1,
        ..CompileOptions::default()
    };
    let compiled = compile(&resolved, &options).unwrap();
    assert_eq!(compiled.locals.get("root"), Some(&1));
    assert_eq!(compiled.locals.get("wizard"), Some(&2));

    let wizard = compiled.image.object(2).unwrap();
    assert_eq!(wizard.parent, 1);
    assert_eq!(wizard.owner, 2);
    assert_eq!(wizard.flags, 1 | 2 | 4);
    assert!(!wizard.properties[0].defined_here);

    let bytes = compiled.image.to_bytes().unwrap();
    let image = DbImage::from_bytes(&bytes).unwrap();
    assert_eq!(image, compiled.image);

    let database = unparse(&decompile(&image, &DecompileMode::Database).unwrap());
    assert_eq!(image_of(&database, 0), image);

    let module = decompile(
        &image,
        &DecompileMode::Module {
            name: "core".into(),
            version: Some("1.0.0".into()),
        },
    )
    .unwrap();
    let text = unparse(&module);
    assert!(text.contains("object @root_class"), "{text}");
    assert!(text.contains("exports @root_class, @wizard;"), "{text}");
    // Parents come first, so the same first number restores the numbering.
    assert_eq!(image_of(&text, 1), image);
}

#[test]
fn test_unpacked_tree_packs_back_to_the_same_unit() {
    let dir = tempfile::tempdir().unwrap();
    write_core(dir.path());
    let unit = pack(&dir.path().join("core/module.moo"), &FsLoader).unwrap();

    let out = dir.path().join("out");
    let tree = unpack(&unit, &FlatLayout::default());
    tree.write_to(&out).unwrap();
    assert!(out.join("module.moo").is_file());
    assert!(out.join("objects/root.moo").is_file());

    let again = pack(&out.join("module.moo"), &FsLoader).unwrap();
    assert_eq!(again, unit);
    assert_eq!(unpack(&again, &FlatLayout::default()).files, tree.files);
}

#[test]
fn test_batch_check_reports_each_failure_once() {
    let dir = tempfile::tempdir().unwrap();
    write_core(dir.path());
    fs::create_dir_all(dir.path().join("lobby")).unwrap();
    fs::write(
        dir.path().join("lobby/module.moo"),
        "module lobby;\nrequires core \"^1\";\nobject @lobby\n  parent core::root;\n  owner core::wizard;\nendobject\n",
    )
    .unwrap();
    fs::create_dir_all(dir.path().join("broken")).unwrap();
    fs::write(
        dir.path().join("broken/module.moo"),
        "module broken;\nrequires core \">=2\";\n",
    )
    .unwrap();

    let roots = project::discover(dir.path()).unwrap();
    assert_eq!(roots.len(), 3);
    let sources = SourceDb::new();
    let report = project::check(&roots, &FsLoader, &sources, &[]);

    assert_eq!(report.failed, vec![dir.path().join("broken/module.moo")]);
    assert_eq!(report.resolved.len(), 2);
    assert_eq!(report.diagnostics.error_count(), 1);

    let error = report
        .diagnostics
        .diagnostics()
        .iter()
        .find(|d| d.code.as_deref() == Some("E0010"))
        .unwrap();
    let rendered = sources.render(error);
    assert!(rendered.contains("broken"), "{rendered}");
    assert!(rendered.contains("error[E0010]"), "{rendered}");
}
