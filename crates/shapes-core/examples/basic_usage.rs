//! Basic usage example - discover the shapes of one model directory

use shapes_core::{discover, CoreMlReader, Result};

fn main() -> Result<()> {
    // Get path from args or use current directory
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "./example-model".to_string());

    println!("Discovering shapes in: {}", path);
    let result = discover(path.as_ref(), &CoreMlReader)?;

    let shapes = result.shapes;
    println!(
        "batch_size={} context_length={} hidden_size={} vocab_size={}",
        shapes.batch_size, shapes.context_length, shapes.hidden_size, shapes.vocab_size
    );

    println!("Found {} components:", result.components.len());
    for (role, record) in &result.components {
        println!(
            "  - {} ({} inputs, {} outputs) {}",
            role,
            record.inputs.len(),
            record.outputs.len(),
            record.file_path.display()
        );
    }

    Ok(())
}
