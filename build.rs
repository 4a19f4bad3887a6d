use std::error::Error;

// Emits VERGEN_* variables consumed by `avbbs --version`.
fn main() -> Result<(), Box<dyn Error>> {
    let build = vergen_gitcl::BuildBuilder::default()
        .build_date(true)
        .build()?;
    let cargo = vergen_gitcl::CargoBuilder::default()
        .target_triple(true)
        .build()?;
    let git = vergen_gitcl::GitclBuilder::default()
        .sha(true)
        .dirty(true)
        .build()?;

    vergen_gitcl::Emitter::default()
        .add_instructions(&build)?
        .add_instructions(&cargo)?
        .add_instructions(&git)?
        .emit()?;
    Ok(())
}
