/// Parse a human-friendly size string into bytes.
///
/// Accepts plain byte counts ("1000000") and k/m/g suffixes with an optional
/// trailing "b", case-insensitive ("64kb", "2M", "1g"). Suffixes are binary.
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();

    let (num_part, suffix) = match s.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(pos) => (&s[..pos], s[pos..].trim()),
        None => (s.as_str(), ""),
    };

    let multiplier: u64 = match suffix {
        "" | "b" => 1,
        "k" | "kb" => 1 << 10,
        "m" | "mb" => 1 << 20,
        "g" | "gb" => 1 << 30,
        _ => return Err(format!("Unknown size suffix: {}. Use b, kb, mb, or gb", suffix)),
    };

    // Plain integers are taken exactly, fractions only make sense with a suffix
    if let Ok(n) = num_part.parse::<u64>() {
        return n
            .checked_mul(multiplier)
            .ok_or_else(|| format!("Size too large: {}", s));
    }

    let num: f64 = num_part
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_part))?;
    Ok((num * multiplier as f64) as u64)
}
