//! Best 50 成绩图。文字与色块用 plotters 绘制到位图，封面再用 image 叠加。

use crate::maimai::score::LevelIndex;
use crate::maimai::{Best50, Score};
use base64::{Engine as _, engine::general_purpose};
use chrono::Local;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbImage, RgbaImage};
use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::{Path, PathBuf};

pub const CANVAS: (u32, u32) = (1400, 1600);
pub const CARD: (u32, u32) = (270, 114);
pub const COVER: u32 = 75;

const COLUMNS: usize = 5;
const GAP: u32 = 8;
const B35_TOP: u32 = 190;
const B15_TOP: u32 = 1100;

/// Basic / Advanced / Expert / Master / Re:Master
const DIFFICULTY_COLORS: [RGBColor; 5] = [
    RGBColor(0x22, 0xBB, 0x5B),
    RGBColor(0xFB, 0x9C, 0x2D),
    RGBColor(0xF6, 0x48, 0x61),
    RGBColor(0x9A, 0x5A, 0xCD),
    RGBColor(0xBA, 0x55, 0xD3),
];

struct ColorScheme {
    background: RGBColor,
    text_primary: RGBColor,
    text_secondary: RGBColor,
    divider: RGBColor,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            background: RGBColor(244, 246, 251),
            text_primary: RGBColor(30, 41, 59),
            text_secondary: RGBColor(100, 116, 139),
            divider: RGBColor(203, 213, 225),
        }
    }
}

/// 绘图参数，整体移动到阻塞线程中使用
#[derive(Debug, Clone)]
pub struct B50Style {
    pub font_family: String,
    pub cover_dir: PathBuf,
}

impl B50Style {
    fn family(&self) -> &str {
        if self.font_family.is_empty() {
            "sans-serif"
        } else {
            &self.font_family
        }
    }
}

type Canvas<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

fn difficulty_color(level: LevelIndex) -> RGBColor {
    DIFFICULTY_COLORS
        .get(level.index() as usize)
        .copied()
        .unwrap_or(DIFFICULTY_COLORS[3])
}

/// YIQ 亮度判断，浅色底用黑字
fn contrast_color(bg: RGBColor) -> RGBColor {
    let (r, g, b) = (bg.0 as u32, bg.1 as u32, bg.2 as u32);
    let yiq = (r * 299 + g * 587 + b * 114) / 1000;
    if yiq >= 160 {
        RGBColor(0, 0, 0)
    } else {
        RGBColor(255, 255, 255)
    }
}

fn truncate_text_to_fit(font: &FontDesc, text: &str, max_width: u32) -> String {
    let (w, _) = font.box_size(text).unwrap_or((0, 0));
    if w <= max_width {
        return text.to_string();
    }

    let mut s = text.to_string();
    while !s.is_empty() {
        s.pop();
        let candidate = format!("{}...", s);
        let (w, _) = font.box_size(&candidate).unwrap_or((0, 0));
        if w <= max_width {
            return candidate;
        }
    }
    "...".to_string()
}

/// 第 `index` 张卡片的左上角 (B35/B15 各自从 0 计)
pub fn slot(section_top: u32, index: usize) -> (i32, i32) {
    let total_width = COLUMNS as u32 * CARD.0 + (COLUMNS as u32 - 1) * GAP;
    let margin = (CANVAS.0 - total_width) / 2;
    let col = (index % COLUMNS) as u32;
    let row = (index / COLUMNS) as u32;
    (
        (margin + col * (CARD.0 + GAP)) as i32,
        (section_top + row * (CARD.1 + GAP)) as i32,
    )
}

/// 封面文件：先按原始编号找，再按规范编号找
pub fn cover_path(dir: &Path, score: &Score) -> Option<PathBuf> {
    [score.track.to_raw(), score.track.canonical]
        .into_iter()
        .map(|id| dir.join(format!("{}.png", id)))
        .find(|p| p.exists())
}

fn load_cover(dir: &Path, score: &Score) -> Option<RgbaImage> {
    let path = cover_path(dir, score)?;
    match image::open(&path) {
        Ok(img) => Some(imageops::resize(
            &img.to_rgba8(),
            COVER,
            COVER,
            FilterType::Lanczos3,
        )),
        Err(e) => {
            warn!(target: "Maicn", "读取封面 {} 失败: {}", path.display(), e);
            None
        }
    }
}

fn overlay_image(base: &mut RgbaImage, overlay: &RgbaImage, x: i32, y: i32) {
    let (base_w, base_h) = base.dimensions();
    let (overlay_w, overlay_h) = overlay.dimensions();

    for oy in 0..overlay_h {
        for ox in 0..overlay_w {
            let bx = x + ox as i32;
            let by = y + oy as i32;
            if bx < 0 || by < 0 || bx >= base_w as i32 || by >= base_h as i32 {
                continue;
            }

            let fg = overlay.get_pixel(ox, oy);
            let alpha = fg[3] as f32 / 255.0;
            if alpha <= 0.0 {
                continue;
            }
            let bg = base.get_pixel(bx as u32, by as u32);
            let blended = Rgba([
                ((1.0 - alpha) * bg[0] as f32 + alpha * fg[0] as f32) as u8,
                ((1.0 - alpha) * bg[1] as f32 + alpha * fg[1] as f32) as u8,
                ((1.0 - alpha) * bg[2] as f32 + alpha * fg[2] as f32) as u8,
                255,
            ]);
            base.put_pixel(bx as u32, by as u32, blended);
        }
    }
}

fn save_rgba_to_base64(img: RgbaImage) -> Result<String, String> {
    let mut cursor = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| format!("图片编码失败: {}", e))?;
    let b64 = general_purpose::STANDARD.encode(cursor.into_inner());
    Ok(format!("base64://{}", b64))
}

fn rating_sum(scores: &[Score]) -> u32 {
    scores
        .iter()
        .filter_map(|s| s.dx_rating)
        .map(|r| r as u32)
        .sum()
}

fn draw_header(
    root: &Canvas,
    style: &B50Style,
    player_name: &str,
    best: &Best50,
) -> Result<(), String> {
    let colors = ColorScheme::default();
    let family = style.family();

    let name_font = (family, 44).into_font();
    let name = truncate_text_to_fit(&name_font, player_name, 900);
    root.draw_text(&name, &name_font.color(&colors.text_primary), (40, 36))
        .map_err(|e| e.to_string())?;

    let rating = format!("Rating {}", best.rating);
    root.draw_text(
        &rating,
        &(family, 30).into_font().color(&colors.text_primary),
        (40, 96),
    )
    .map_err(|e| e.to_string())?;

    let detail = format!(
        "B35 {}  +  B15 {}",
        rating_sum(&best.b35),
        rating_sum(&best.b15)
    );
    let detail_style = (family, 22)
        .into_font()
        .color(&colors.text_secondary)
        .pos(Pos::new(HPos::Right, VPos::Top));
    root.draw_text(&detail, &detail_style, (CANVAS.0 as i32 - 40, 104))
        .map_err(|e| e.to_string())?;

    for (label, top) in [("Best 35", B35_TOP), ("Best 15", B15_TOP)] {
        let y = top as i32 - 34;
        root.draw_text(
            label,
            &(family, 22).into_font().color(&colors.text_secondary),
            (12, y),
        )
        .map_err(|e| e.to_string())?;
        root.draw(&Rectangle::new(
            [(120, y + 12), (CANVAS.0 as i32 - 12, y + 14)],
            colors.divider.filled(),
        ))
        .map_err(|e| e.to_string())?;
    }

    let footer = format!("RemiBot · {}", Local::now().format("%Y-%m-%d %H:%M"));
    let footer_style = (family, 18)
        .into_font()
        .color(&colors.text_secondary)
        .pos(Pos::new(HPos::Center, VPos::Bottom));
    root.draw_text(
        &footer,
        &footer_style,
        (CANVAS.0 as i32 / 2, CANVAS.1 as i32 - 24),
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

fn draw_card(
    root: &Canvas,
    style: &B50Style,
    score: &Score,
    rank: usize,
    (x, y): (i32, i32),
) -> Result<(), String> {
    let family = style.family();
    let bg = difficulty_color(score.level_index);
    let fg = contrast_color(bg);

    root.draw(&Rectangle::new(
        [(x, y), (x + CARD.0 as i32, y + CARD.1 as i32)],
        bg.filled(),
    ))
    .map_err(|e| e.to_string())?;

    // 封面占位，有封面时会被覆盖
    let (cx, cy) = (x + 12, y + 12);
    root.draw(&Rectangle::new(
        [(cx, cy), (cx + COVER as i32, cy + COVER as i32)],
        RGBAColor(255, 255, 255, 0.35).filled(),
    ))
    .map_err(|e| e.to_string())?;

    root.draw_text(
        &format!("#{}", rank),
        &(family, 13).into_font().color(&fg),
        (cx, cy + COVER as i32 + 4),
    )
    .map_err(|e| e.to_string())?;

    let text_x = cx + COVER as i32 + 10;
    let text_width = (x + CARD.0 as i32 - 8 - text_x).max(0) as u32;

    let title_font = (family, 16).into_font();
    let title = score
        .title
        .clone()
        .unwrap_or_else(|| format!("#{}", score.track));
    let title = truncate_text_to_fit(&title_font, &title, text_width);
    root.draw_text(&title, &title_font.color(&fg), (text_x, y + 10))
        .map_err(|e| e.to_string())?;

    root.draw_text(
        &format!("{:.4}%", score.achievements),
        &(family, 22).into_font().color(&fg),
        (text_x, y + 32),
    )
    .map_err(|e| e.to_string())?;

    let mut badges = vec![score.rate().label()];
    badges.extend(score.fc.map(|f| f.label()));
    badges.extend(score.fs.map(|f| f.label()));
    root.draw_text(
        &badges.join("  "),
        &(family, 14).into_font().color(&fg),
        (text_x, y + 62),
    )
    .map_err(|e| e.to_string())?;

    let level = score
        .level_value
        .map(|v| format!("{:.1}", v))
        .unwrap_or_else(|| "?".to_string());
    let rating = score
        .dx_rating
        .map(|r| format!("{:.0}", r.floor()))
        .unwrap_or_else(|| "-".to_string());
    root.draw_text(
        &format!("{} {} → {}", score.level_index.name(), level, rating),
        &(family, 14).into_font().color(&fg),
        (text_x, y + 86),
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

/// 系统里没有可用字体时 plotters 无法排版，提前报错而不是输出缺字的图
fn ensure_font(family: &str) -> Result<(), String> {
    (family, 12)
        .into_font()
        .box_size("A")
        .map(|_| ())
        .map_err(|e| format!("字体 {} 不可用: {}", family, e))
}

/// 渲染 Best 50，返回 `base64://` 图片
pub fn render(player_name: &str, best: &Best50, style: &B50Style) -> Result<String, String> {
    ensure_font(style.family())?;

    let (width, height) = CANVAS;
    let colors = ColorScheme::default();
    let mut buffer = vec![0u8; (width * height * 3) as usize];

    let b35 = best.b35.iter().take(35).enumerate().map(|(i, s)| (s, i, slot(B35_TOP, i)));
    let b15 = best.b15.iter().take(15).enumerate().map(|(i, s)| (s, i, slot(B15_TOP, i)));
    let cards: Vec<(&Score, usize, (i32, i32))> = b35.chain(b15).collect();

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&colors.background).map_err(|e| e.to_string())?;

        draw_header(&root, style, player_name, best)?;
        for (score, index, pos) in &cards {
            draw_card(&root, style, score, index + 1, *pos)?;
        }

        root.present().map_err(|e| e.to_string())?;
    }

    let rgb = RgbImage::from_raw(width, height, buffer)
        .ok_or_else(|| "无法从原始像素数据构建图像".to_string())?;
    let mut canvas = DynamicImage::ImageRgb8(rgb).to_rgba8();

    let mut missing = 0;
    for (score, _, (x, y)) in &cards {
        match load_cover(&style.cover_dir, score) {
            Some(cover) => overlay_image(&mut canvas, &cover, x + 12, y + 12),
            None => missing += 1,
        }
    }
    if missing > 0 {
        debug!(target: "Maicn", "B50 共 {} 张封面缺失", missing);
    }

    save_rgba_to_base64(canvas)
}
