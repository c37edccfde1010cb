//! Batch job scripts
//!
//! A job script only re-invokes `fireslurm direct-run` on the worker node
//! with the job's run specification; all staging happens there.

use std::path::Path;

/// Quotes `arg` for a POSIX shell, leaving plain words untouched
pub fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"_-./:=+,@%".contains(&b));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

/// `-v`, `-vv`, ... for a verbosity level, `None` at level 0
pub fn verbosity_flag(verbosity: u8) -> Option<String> {
    (verbosity > 0).then(|| format!("-{}", "v".repeat(verbosity as usize)))
}

/// The command line a job runs: `<bin> [-v...] <args...>`
pub fn invocation(fireslurm_bin: &Path, verbosity: u8, args: &[String]) -> Vec<String> {
    let mut argv = vec![fireslurm_bin.to_string_lossy().into_owned()];
    argv.extend(verbosity_flag(verbosity));
    argv.extend(args.iter().cloned());
    argv
}

/// Renders the script submitted to `sbatch`
pub fn render_job_script(job_name: &str, argv: &[String]) -> String {
    let line = argv
        .iter()
        .map(|a| shell_quote(a))
        .collect::<Vec<_>>()
        .join(" \\\n    ");

    format!(
        "#!/usr/bin/env bash\n\
         # fireslurm batch job {}\n\
         echo \"Job $SLURM_JOB_ID ($SLURM_JOB_NAME) on $(hostname)\"\n\
         exec {}\n",
        job_name, line
    )
}
