//! Conventions ASCII des programmes interactifs : le texte entre sous forme de
//! codes de caractères terminés par `\n`, et ressort de la même façon.

use std::fmt::Write;

use intcode_vm::Handle;

/// Codes de caractères de `text` suivis d'un saut de ligne.
pub fn encode_line(text: &str) -> Vec<i64> {
    text.bytes().chain(std::iter::once(b'\n')).map(i64::from).collect()
}

/// Envoie une ligne à la machine. `false` si elle s'arrête avant de tout prendre.
pub fn send_line(handle: &Handle, text: &str) -> bool {
    encode_line(text).into_iter().all(|c| handle.add_input(c))
}

/// Rendu des sorties : l'ASCII en caractères, le reste en `[n]`.
pub fn render(values: &[i64]) -> String {
    let mut out = String::with_capacity(values.len());
    for &v in values {
        match u8::try_from(v) {
            Ok(b) if b.is_ascii() => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "[{v}]");
            }
        }
    }
    out
}
