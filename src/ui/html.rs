/// Escapes text for use in element content and quoted attribute values.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn price(amount: f64) -> String {
    format!("${amount:.2}")
}

pub fn checked(on: bool) -> &'static str {
    if on { " checked" } else { "" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<img src="x" onerror='y'>&"#),
            "&lt;img src=&quot;x&quot; onerror=&#39;y&#39;&gt;&amp;"
        );
        assert_eq!(escape("Crème brûlée"), "Crème brûlée");
    }

    #[test]
    fn test_price_has_two_decimals() {
        assert_eq!(price(5.5), "$5.50");
        assert_eq!(price(12.0), "$12.00");
        assert_eq!(price(7.999), "$8.00");
    }
}
