//! Name mangling helpers shared by the scanner passes.

use once_cell::sync::Lazy;
use regex::Regex;

static LOWER_UPPER: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^A-Z])([A-Z])").unwrap());
static UPPER_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([A-Z][A-Z])([A-Z][0-9a-z])").unwrap());
static LEADING_PAIR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z])([A-Z])").unwrap());

/// Convert a CamelCase name into underscored form.
///
/// `GtkWidget` becomes `Gtk_Widget`; a leading two-capital run is split as
/// well (`GObject` becomes `G_Object`).
pub fn to_underscores(name: &str) -> String {
    let name = to_underscores_noprefix(name);
    LEADING_PAIR.replace(&name, "${1}_${2}").into_owned()
}

/// Like [`to_underscores`] but leaves a leading capital pair alone.
///
/// Used for type names that already had their namespace prefix stripped,
/// e.g. `DBusProxy` becomes `DBus_Proxy`.
pub fn to_underscores_noprefix(name: &str) -> String {
    let name = LOWER_UPPER.replace_all(name, "${1}_${2}");
    UPPER_RUN.replace_all(&name, "${1}_${2}").into_owned()
}

/// Capitalize the first character of a word
pub fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_underscores() {
        assert_eq!(to_underscores("GtkWidget").to_lowercase(), "gtk_widget");
        assert_eq!(to_underscores("GObject").to_lowercase(), "g_object");
        assert_eq!(to_underscores("DBusProxy").to_lowercase(), "d_bus_proxy");
    }

    #[test]
    fn test_to_underscores_noprefix() {
        assert_eq!(to_underscores_noprefix("TextBuffer").to_lowercase(), "text_buffer");
        assert_eq!(to_underscores_noprefix("DBusProxy").to_lowercase(), "dbus_proxy");
        assert_eq!(to_underscores_noprefix("IOErrorEnum").to_lowercase(), "io_error_enum");
    }

    #[test]
    fn test_capitalize() {
        assert_eq!(capitalize("since"), "Since");
        assert_eq!(capitalize("STABLE"), "Stable");
        assert_eq!(capitalize(""), "");
    }
}
