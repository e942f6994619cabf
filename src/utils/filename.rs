//! Upload filename helpers

use unicode_normalization::UnicodeNormalization;

use super::constants::EXCEL_EXTENSIONS;

const WINDOWS_DEVICE_NAMES: [&str; 22] = [
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// True when the name, as received, ends with an accepted workbook extension
pub fn is_excel_filename(name: &str) -> bool {
    EXCEL_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}

/// Reduce a client supplied filename to a safe flat name.
///
/// The name is NFKD-normalized and reduced to ASCII, so accented letters keep
/// their base letter (`año` becomes `ano`). Path separators of the host become
/// spaces, runs of whitespace become a single `_`, and anything outside
/// `[A-Za-z0-9_.-]` is removed. Leading/trailing dots and underscores are
/// trimmed so the result can never address a parent directory or a hidden
/// file. On Windows, reserved device names get a `_` prefix. The result may be
/// empty.
pub fn secure_filename(name: &str) -> String {
    let ascii: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if is_path_separator(c) { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    let cleaned: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    let mut result = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();

    if cfg!(windows) && is_windows_device_name(&result) {
        result.insert(0, '_');
    }

    result
}

fn is_path_separator(c: char) -> bool {
    c == '/' || (cfg!(windows) && c == '\\')
}

fn is_windows_device_name(name: &str) -> bool {
    let stem = name.split('.').next().unwrap_or_default().to_ascii_uppercase();
    !name.is_empty() && WINDOWS_DEVICE_NAMES.contains(&stem.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excel_extension_check() {
        assert!(is_excel_filename("report.xlsx"));
        assert!(is_excel_filename("legacy.xls"));
        assert!(!is_excel_filename("report.csv"));
        // Case-sensitive, matching what clients send
        assert!(!is_excel_filename("REPORT.XLSX"));
        assert!(!is_excel_filename(""));
    }

    #[test]
    fn test_secure_filename_basics() {
        assert_eq!(secure_filename("My cool movie.mov"), "My_cool_movie.mov");
        assert_eq!(secure_filename("../../../etc/passwd"), "etc_passwd");
        assert_eq!(
            secure_filename("i contain cool \u{fc}ml\u{e4}uts.txt"),
            "i_contain_cool_umlauts.txt"
        );
        assert_eq!(secure_filename("R011 directo (marzo).xlsx"), "R011_directo_marzo.xlsx");
    }

    #[test]
    fn test_secure_filename_keeps_base_letters() {
        assert_eq!(secure_filename("Reporte año señal.xlsx"), "Reporte_ano_senal.xlsx");
        assert_eq!(secure_filename("Táchira Mérida.xls"), "Tachira_Merida.xls");
        // Decomposed input normalizes the same way
        assert_eq!(secure_filename("an\u{303}o.xlsx"), "ano.xlsx");
        // No ASCII base letter at all
        assert_eq!(secure_filename("日本語.xlsx"), "xlsx");
    }

    #[test]
    fn test_secure_filename_edge_cases() {
        assert_eq!(secure_filename("..."), "");
        assert_eq!(secure_filename("__init__.xlsx"), "init__.xlsx");
    }

    #[cfg(not(windows))]
    #[test]
    fn test_secure_filename_unix_host() {
        assert_eq!(secure_filename("con.xlsx"), "con.xlsx");
        assert_eq!(secure_filename("C:\\Users\\ana\\datos.xls"), "CUsersanadatos.xls");
    }

    #[cfg(windows)]
    #[test]
    fn test_secure_filename_windows_host() {
        assert_eq!(secure_filename("con.xlsx"), "_con.xlsx");
        assert_eq!(secure_filename("C:\\Users\\ana\\datos.xls"), "C_Users_ana_datos.xls");
    }
}
