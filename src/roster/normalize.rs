use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Strips Vietnamese (and other Latin) diacritics. `đ`/`Đ` carry a stroke
/// rather than a combining mark, so NFD alone leaves them untouched.
pub fn fold_diacritics(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'đ' => 'd',
            'Đ' => 'D',
            _ => c,
        })
        .collect::<String>()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Lowercased, diacritic-free label with every run of non-alphanumeric
/// characters collapsed into a single `_`, e.g. `"Họ và tên (*)"` ->
/// `"ho_va_ten"`.
pub fn normalize_label(input: &str) -> String {
    let folded = fold_diacritics(input).to_lowercase();
    let mut out = String::with_capacity(folded.len());
    let mut pending_sep = false;
    for ch in folded.chars() {
        if ch.is_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch);
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Collapses internal whitespace to single spaces and trims the ends.
pub fn squash_spaces(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_vietnamese_headers() {
        let cases = [
            ("Mã Sinh Viên", "ma_sinh_vien"),
            ("MSSV", "mssv"),
            ("Họ tên", "ho_ten"),
            ("Họ và tên", "ho_va_ten"),
            ("Họ đệm", "ho_dem"),
            ("Tên", "ten"),
            ("Số điện thoại", "so_dien_thoai"),
            ("SĐT", "sdt"),
            ("Lớp", "lop"),
            ("Ngày sinh", "ngay_sinh"),
            ("Giới tính", "gioi_tinh"),
            ("  E-mail  ", "e_mail"),
            ("Họ và tên (*)", "ho_va_ten"),
            ("student_code", "student_code"),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize_label(input), expected, "input {:?}", input);
        }
    }

    #[test]
    fn stroked_d_folds_in_both_cases() {
        assert_eq!(fold_diacritics("Đ"), "D");
        assert_eq!(fold_diacritics("đệm"), "dem");
        assert_eq!(normalize_label("Đ"), "d");
    }

    #[test]
    fn gender_words_fold() {
        assert_eq!(normalize_label("Nữ"), "nu");
        assert_eq!(normalize_label(" Nam "), "nam");
    }

    #[test]
    fn blank_label_is_empty() {
        assert_eq!(normalize_label("   "), "");
        assert_eq!(normalize_label("(*)"), "");
    }

    #[test]
    fn squash_spaces_collapses_runs() {
        assert_eq!(squash_spaces("  Nguyễn   Văn  A "), "Nguyễn Văn A");
    }
}
