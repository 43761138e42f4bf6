use std::path::Path;
use tidewater_application::reporting::generate_report;
use tidewater_infrastructure::artifacts::{FilesystemArtifactReader, FilesystemArtifactWriter};

pub fn run(input: &Path) -> Result<(), String> {
    let reader = FilesystemArtifactReader::new();
    let writer = FilesystemArtifactWriter::new();
    let result = generate_report(input, &reader, &writer)?;

    println!("Run: {}", result.run_id);
    println!("Fills: {}", result.fills);
    super::print_summary(&result.summary);
    Ok(())
}
