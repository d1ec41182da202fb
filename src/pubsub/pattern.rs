/// Glob match of a channel name against a subscription pattern.
///
/// `*` matches any run of characters (including none) and `?` matches exactly
/// one. Everything else matches literally.
pub fn pattern_matches(pattern: &str, channel: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let c: Vec<char> = channel.chars().collect();

    let (mut pi, mut ci) = (0, 0);
    // position of the last `*` seen, and the channel index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while ci < c.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == c[ci]) {
            pi += 1;
            ci += 1;
        } else if pi < p.len() && p[pi] == '*' {
            backtrack = Some((pi, ci));
            pi += 1;
        } else if let Some((star, at)) = backtrack {
            pi = star + 1;
            ci = at + 1;
            backtrack = Some((star, at + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&ch| ch == '*')
}
