use crate::blastn::SequenceRecord;
use anyhow::{anyhow, Result};
use needletail::parse_fastx_file;
use std::path::Path;

/// Load query sequences whose FASTA ids are integers, in file order.
///
/// Only the first whitespace-separated token of the header is used as the id.
pub fn load_query_sequences(path: &Path) -> Result<Vec<SequenceRecord>> {
    let mut reader = parse_fastx_file(path)
        .map_err(|e| anyhow!("failed to open FASTA {}: {}", path.display(), e))?;
    let mut records = Vec::new();

    while let Some(result) = reader.next() {
        let record = result.map_err(|e| anyhow!("failed to parse FASTA record: {}", e))?;
        let header = std::str::from_utf8(record.id())
            .map_err(|_| anyhow!("FASTA header is not valid UTF-8 in {}", path.display()))?;
        let name = header.split_whitespace().next().unwrap_or("");
        let id = name
            .parse()
            .map_err(|_| anyhow!("FASTA id '{}' is not an integer", name))?;
        let sequence = String::from_utf8_lossy(&record.seq()).to_ascii_uppercase();
        records.push(SequenceRecord { id, sequence });
    }

    Ok(records)
}
