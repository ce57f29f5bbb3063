//! Listings de programmes : entiers en base 10 séparés par des virgules.

use std::{
    fs,
    io::{self, Read},
    path::Path,
};

use anyhow::{bail, Context, Result};

/// Parse un listing tel que `1,9,10,3,2,3,11,0,99,30,40,50`.
///
/// Les blancs (sauts de ligne compris) autour des valeurs sont ignorés et une
/// virgule finale est tolérée. Un listing vide est une erreur.
pub fn parse_program(text: &str) -> Result<Vec<i64>> {
    let values = parse_values(text)?;
    if values.is_empty() {
        bail!("program listing is empty");
    }
    Ok(values)
}

/// Même grammaire que [`parse_program`], mais une liste vide est acceptée.
pub fn parse_values(text: &str) -> Result<Vec<i64>> {
    let trimmed = text.trim();
    let body = trimmed.strip_suffix(',').unwrap_or(trimmed);
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    body.split(',')
        .enumerate()
        .map(|(i, tok)| {
            let tok = tok.trim();
            tok.parse::<i64>().with_context(|| format!("value #{i}: `{tok}` is not an integer"))
        })
        .collect()
}

/// Lit et parse un listing depuis `path`, ou stdin si `path` vaut `-`.
pub fn load_program(path: &Path) -> Result<Vec<i64>> {
    let text = if path == Path::new("-") {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s).context("lecture de stdin")?;
        s
    } else {
        fs::read_to_string(path).with_context(|| format!("lecture de {}", path.display()))?
    };
    parse_program(&text).with_context(|| format!("parsing {}", path.display()))
}
