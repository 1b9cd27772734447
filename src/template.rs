use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook};
use std::path::Path;

pub const TEMPLATE_SHEET_NAME: &str = "DanhSach";

/// Column headers of the downloadable roster template, one per canonical
/// field (full name split into Họ đệm + Tên).
pub const TEMPLATE_HEADERS: [&str; 8] = [
    "MSSV",
    "Họ đệm",
    "Tên",
    "Email",
    "Số điện thoại",
    "Lớp",
    "Ngày sinh",
    "Giới tính",
];

const TEMPLATE_EXAMPLES: [[&str; 8]; 2] = [
    [
        "21200123",
        "Nguyễn Văn",
        "An",
        "",
        "0912345678",
        "CNTT K21",
        "15/03/2003",
        "Nam",
    ],
    [
        "21200124",
        "Trần Thị",
        "Bình",
        "binh.tran@gmail.com",
        "",
        "CNTT K21",
        "02/11/2003",
        "Nữ",
    ],
];

const COLUMN_WIDTHS: [f64; 8] = [14.0, 20.0, 12.0, 28.0, 16.0, 14.0, 14.0, 12.0];

pub fn write_template(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(TEMPLATE_SHEET_NAME)?;

    let header_fmt = Format::new()
        .set_bold()
        .set_border(FormatBorder::Thin)
        .set_align(FormatAlign::Center)
        .set_align(FormatAlign::VerticalCenter);
    let cell_fmt = Format::new().set_border(FormatBorder::Thin);

    for (col, header) in TEMPLATE_HEADERS.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, *header, &header_fmt)?;
        worksheet.set_column_width(col as u16, COLUMN_WIDTHS[col])?;
    }
    for (i, example) in TEMPLATE_EXAMPLES.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, value) in example.iter().enumerate() {
            // Written as text so leading zeros in codes and phones survive.
            worksheet.write_string_with_format(row, col as u16, *value, &cell_fmt)?;
        }
    }

    workbook.save(path)?;
    log::info!("wrote roster template to {}", path.display());
    Ok(())
}
