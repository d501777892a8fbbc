//! Line-level diff used by the pattern extractors.

/// Inputs whose differing middle section exceeds this many line pairs are not diffed.
const MAX_DIFF_CELLS: usize = 2000 * 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk<'a> {
    pub removed: Vec<&'a str>,
    pub added: Vec<&'a str>,
}

impl Hunk<'_> {
    pub fn is_pure_removal(&self) -> bool {
        self.added.is_empty() && !self.removed.is_empty()
    }

    pub fn is_pure_addition(&self) -> bool {
        self.removed.is_empty() && !self.added.is_empty()
    }
}

/// Group the changed lines between `before` and `after` into hunks. Returns
/// `None` when the inputs are too large to diff.
pub fn diff_hunks<'a>(before: &'a str, after: &'a str) -> Option<Vec<Hunk<'a>>> {
    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();

    let prefix = old
        .iter()
        .zip(new.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let old_mid = &old[prefix..old.len() - suffix];
    let new_mid = &new[prefix..new.len() - suffix];

    if old_mid.len().saturating_mul(new_mid.len()) > MAX_DIFF_CELLS {
        return None;
    }

    // lcs[i][j] = LCS length of old_mid[i..] and new_mid[j..]
    let rows = old_mid.len() + 1;
    let cols = new_mid.len() + 1;
    let mut lcs = vec![0u32; rows * cols];
    for i in (0..old_mid.len()).rev() {
        for j in (0..new_mid.len()).rev() {
            lcs[i * cols + j] = if old_mid[i] == new_mid[j] {
                lcs[(i + 1) * cols + j + 1] + 1
            } else {
                lcs[(i + 1) * cols + j].max(lcs[i * cols + j + 1])
            };
        }
    }

    let mut hunks = Vec::new();
    let mut current = Hunk {
        removed: Vec::new(),
        added: Vec::new(),
    };
    let (mut i, mut j) = (0, 0);

    while i < old_mid.len() || j < new_mid.len() {
        if i < old_mid.len() && j < new_mid.len() && old_mid[i] == new_mid[j] {
            flush(&mut current, &mut hunks);
            i += 1;
            j += 1;
        } else if j < new_mid.len()
            && (i == old_mid.len() || lcs[i * cols + j + 1] >= lcs[(i + 1) * cols + j])
        {
            current.added.push(new_mid[j]);
            j += 1;
        } else {
            current.removed.push(old_mid[i]);
            i += 1;
        }
    }
    flush(&mut current, &mut hunks);

    Some(hunks)
}

fn flush<'a>(current: &mut Hunk<'a>, hunks: &mut Vec<Hunk<'a>>) {
    if !current.removed.is_empty() || !current.added.is_empty() {
        hunks.push(std::mem::replace(
            current,
            Hunk {
                removed: Vec::new(),
                added: Vec::new(),
            },
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_has_no_hunks() {
        assert_eq!(diff_hunks("a\nb\n", "a\nb\n").unwrap(), vec![]);
    }

    #[test]
    fn test_single_line_change() {
        let hunks = diff_hunks("a\nvar x = 1;\nc", "a\nconst x = 1;\nc").unwrap();
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].removed, vec!["var x = 1;"]);
        assert_eq!(hunks[0].added, vec!["const x = 1;"]);
    }

    #[test]
    fn test_removal_between_equal_lines() {
        let hunks = diff_hunks(
            "function f() {\n  console.log('x');\n  return 1;\n}",
            "function f() {\n  return 1;\n}",
        )
        .unwrap();
        assert_eq!(hunks.len(), 1);
        assert!(hunks[0].is_pure_removal());
        assert_eq!(hunks[0].removed, vec!["  console.log('x');"]);
    }

    #[test]
    fn test_separate_hunks() {
        let hunks = diff_hunks("a\nb\nc\nd\ne", "a\nB\nc\nD\ne").unwrap();
        assert_eq!(hunks.len(), 2);
    }

    #[test]
    fn test_addition_at_top() {
        let hunks = diff_hunks("x\ny", "'use client';\n\nx\ny").unwrap();
        assert_eq!(hunks.len(), 1);
        assert!(hunks[0].is_pure_addition());
    }
}
