use lanesqrt::buffer::AlignedBuffer;
use lanesqrt::kernels::Backend;
use lanesqrt::kernels::scalar::solve;

use super::OutputFormat;

pub fn run(
    values: &[f32],
    initial_guess: f32,
    backend: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let backend = backend.parse::<Backend>()?;
    if !backend.is_available() {
        log::warn!("{backend} is not supported on this CPU, using the portable lanes");
    }

    let input = AlignedBuffer::from_slice(values)?;
    let mut output = AlignedBuffer::zeroed(values.len())?;
    (backend.kernel())(initial_guess, &input, &mut output);

    // Every backend runs the scalar operation sequence, so the per-element
    // iteration count and outcome come from the scalar solver.
    let rows: Vec<_> = values
        .iter()
        .zip(output.iter())
        .map(|(&s, &root)| (s, root, solve(s, initial_guess)))
        .collect();

    match format {
        OutputFormat::Text => {
            for (s, root, solution) in &rows {
                println!(
                    "{s} -> {root} ({} iterations, {})",
                    solution.iterations, solution.outcome
                );
            }
        }
        OutputFormat::Json => {
            let json: Vec<_> = rows
                .iter()
                .map(|(s, root, solution)| {
                    serde_json::json!({
                        "value": s,
                        "root": root,
                        "iterations": solution.iterations,
                        "outcome": solution.outcome,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }
    Ok(())
}
