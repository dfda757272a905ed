//! Glob matching with the subset of `SCAN MATCH` syntax the status layer uses.

/// Match `key` against a glob `pattern` supporting `*`, `?` and `\` escapes.
pub(crate) fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0usize, 0usize);
    // Position of the last `*` in the pattern and the key index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, k));
                p += 1;
                continue;
            }
            Some('?') => {
                p += 1;
                k += 1;
                continue;
            }
            Some('\\') if p + 1 < pattern.len() => {
                if pattern[p + 1] == key[k] {
                    p += 2;
                    k += 1;
                    continue;
                }
            }
            Some(&c) if c == key[k] => {
                p += 1;
                k += 1;
                continue;
            }
            _ => {}
        }

        match backtrack {
            Some((star, tried)) => {
                p = star + 1;
                k = tried + 1;
                backtrack = Some((star, tried + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}
