//! Runs the MBM generator over the protocol files. A malformed definition or
//! an unsupported feature fails the build here, never at runtime.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use redstone_schema::{codegen, parse, CodegenError, Definition};

fn main() {
    println!("cargo:rerun-if-changed=protocol/clientbound.mbm");
    println!("cargo:rerun-if-changed=protocol/serverbound.mbm");

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    generate(
        "protocol/clientbound.mbm",
        &out_dir.join("clientbound.rs"),
        codegen::clientbound,
    );
    generate(
        "protocol/serverbound.mbm",
        &out_dir.join("serverbound.rs"),
        codegen::serverbound,
    );
}

fn generate(source: &str, target: &Path, emit: fn(&[Definition]) -> Result<String, CodegenError>) {
    let text = fs::read_to_string(source).unwrap_or_else(|err| panic!("cannot read {source}: {err}"));
    let definitions = parse(&text).unwrap_or_else(|err| panic!("{source}: {err}"));
    let code = emit(&definitions).unwrap_or_else(|err| panic!("{source}: {err}"));
    fs::write(target, code).unwrap_or_else(|err| panic!("cannot write {}: {err}", target.display()));
}
