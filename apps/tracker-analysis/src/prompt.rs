//! Interactive confirmation before clobbering output files

use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Result};

/// Ask before overwriting `path`. Returns `Ok(())` when the file does not
/// exist or the user agrees, and an error when they decline.
pub fn confirm_overwrite(path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }
    let stdin = io::stdin();
    let mut stderr = io::stderr();
    if ask_overwrite(path, &mut stdin.lock(), &mut stderr)? {
        eprintln!("File will be overwritten");
        Ok(())
    } else {
        bail!("Not overwriting {}", path.display())
    }
}

/// Prompt on `output` until the answer read from `input` is y or n.
/// End of input counts as no.
pub fn ask_overwrite<R: BufRead, W: Write>(path: &Path, input: &mut R, output: &mut W) -> Result<bool> {
    loop {
        write!(
            output,
            "WARNING: The output path \"{}\" already exists. Would you like to overwrite it? [y/n]: ",
            path.display()
        )?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(false);
        }
        match line.trim().to_lowercase().as_str() {
            "y" => return Ok(true),
            "n" => return Ok(false),
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn ask(answers: &str) -> (bool, String) {
        let mut input = Cursor::new(answers.as_bytes().to_vec());
        let mut output = Vec::new();
        let answer = ask_overwrite(Path::new("out.svg"), &mut input, &mut output).unwrap();
        (answer, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_accepts_yes() {
        let (answer, prompt) = ask("Y\n");
        assert!(answer);
        assert!(prompt.contains("\"out.svg\" already exists"));
    }

    #[test]
    fn test_repeats_until_valid() {
        let (answer, prompt) = ask("maybe\n\nn\n");
        assert!(!answer);
        assert_eq!(prompt.matches("[y/n]").count(), 3);
    }

    #[test]
    fn test_end_of_input_declines() {
        let (answer, _) = ask("");
        assert!(!answer);
    }

    #[test]
    fn test_missing_file_needs_no_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        assert!(confirm_overwrite(&dir.path().join("new.csv")).is_ok());
    }
}
