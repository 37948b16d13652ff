//! ---
//! alerter_section: "01-core-functionality"
//! alerter_subsection: "module"
//! alerter_type: "source"
//! alerter_scope: "code"
//! alerter_description: "Build metadata for version banners."
//! alerter_version: "v0.1.0"
//! alerter_owner: "tbd"
//! ---
use vergen::EmitBuilder;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Source tarballs carry no git metadata; vergen then emits placeholder values.
    EmitBuilder::builder()
        .all_build()
        .all_cargo()
        .all_git()
        .emit()?;

    println!("cargo:rerun-if-changed=build.rs");
    Ok(())
}
