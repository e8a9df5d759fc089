//! Mojibake repair for text crossing the LLM boundary.
//!
//! Responses occasionally arrive with UTF-8 bytes that were re-decoded
//! through a single-byte codepage, turning box-drawing and punctuation into
//! `Γ`-prefixed pairs. The table below reverses the specific sequences seen
//! in this pipeline; no encoding autodetection is attempted.

/// Fixed repair table: double-encoded sequence to intended text.
///
/// No replacement contains `Γ`, which makes the rewrite idempotent.
const REPAIR_TABLE: &[(&str, &str)] = &[
   ("ΓòÉ", "═"),
   ("ΓöÇ", "─"),
   ("Γû¬", "▪"),
   ("ΓÇæ", "-"),
   ("ΓÇô", "-"),
   ("ΓÇö", "-"),
   ("ΓÇÖ", "'"),
   ("ΓÇ£", "\""),
   ("ΓÇ¥", "\""),
   ("ΓÇó", "•"),
   ("ΓÇª", "…"),
];

/// Rewrite known double-encoded sequences to their intended form.
///
/// Strings without any of the sequences pass through untouched (same
/// allocation behavior as `str::replace` on a miss).
pub fn repair_mojibake(text: &str) -> String {
   if !text.contains('Γ') {
      return text.to_string();
   }

   let mut repaired = text.to_string();
   for (broken, intended) in REPAIR_TABLE {
      if repaired.contains(broken) {
         repaired = repaired.replace(broken, intended);
      }
   }
   repaired
}

/// Apply the repair to every string in a list, in place.
pub fn repair_all(items: &mut [String]) {
   for item in items {
      let repaired = repair_mojibake(item);
      if repaired != *item {
         *item = repaired;
      }
   }
}
