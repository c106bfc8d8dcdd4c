use lanesqrt::partition::partition;

pub fn run(count: usize, workers: usize) -> Result<(), Box<dyn std::error::Error>> {
    let ranges = partition(count, workers)?;

    println!("{count} elements over {workers} workers: {} ranges", ranges.len());
    for (i, r) in ranges.iter().enumerate() {
        println!("  worker {i:>2}: [{}, {}) {} elements", r.start, r.end, r.len());
    }
    Ok(())
}
