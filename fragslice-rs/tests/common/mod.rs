// Shared helpers for the blastn tests; not every test binary uses all of them.
#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Writing an executable while another test thread forks can leave the file
/// busy (ETXTBSY) at exec time, so script creation and execution share a lock.
pub static SUBPROCESS_LOCK: Mutex<()> = Mutex::new(());

/// A well-formed 19-column blastn row.
pub fn blast_row(qseqid: i32, subject_title: &str, sstart: i32, send: i32, sframe: i32) -> String {
    [
        qseqid.to_string(),
        "30".to_string(),
        "NC_000006.12".to_string(),
        subject_title.to_string(),
        "96.667".to_string(),
        "100".to_string(),
        "30".to_string(),
        "1".to_string(),
        "0".to_string(),
        "1".to_string(),
        "30".to_string(),
        sstart.to_string(),
        send.to_string(),
        "1".to_string(),
        sframe.to_string(),
        "3.5e-08".to_string(),
        "51.8".to_string(),
        "ACGTACGTACGTACGTACGTACGTACGTAC".to_string(),
        "ACGTACGTACGTACGTTCGTACGTACGTAC".to_string(),
    ]
    .join("\t")
}

/// Creates `<root>/blast/bin/blastn` running `body` under `/bin/sh` and
/// returns the install directory.
#[cfg(unix)]
pub fn fake_blast_install(root: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let blast_dir = root.join("blast");
    let bin_dir = blast_dir.join("bin");
    fs::create_dir_all(&bin_dir).expect("create bin dir");
    let script = bin_dir.join("blastn");
    fs::write(&script, format!("#!/bin/sh\n{body}\n")).expect("write fake blastn");
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).expect("chmod fake blastn");
    blast_dir
}

/// Shell body that checks `BLASTDB`, records its arguments and prints `rows`.
pub fn echo_rows_body(expected_db: &Path, args_file: &Path, rows: &[String]) -> String {
    let mut body = format!(
        "[ \"$BLASTDB\" = \"{}\" ] || {{ echo \"unexpected BLASTDB: $BLASTDB\" >&2; exit 3; }}\n\
         printf '%s\\n' \"$@\" > \"{}\"\n",
        expected_db.display(),
        args_file.display()
    );
    body.push_str("cat <<'ROWS'\n");
    for row in rows {
        body.push_str(row);
        body.push('\n');
    }
    body.push_str("ROWS");
    body
}
