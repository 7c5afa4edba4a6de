#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

pub const VALID_LABEL: &str = "0 0.500000 0.500000 0.400000 0.300000\n";

/// Write a solid-color PNG and return its path
pub fn write_solid_png(dir: &Path, name: &str, color: [u8; 3]) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_pixel(16, 16, Rgb(color))
        .save(&path)
        .expect("write png");
    path
}

/// Write an image whose left half is `left` and right half is `right`
pub fn write_split_png(dir: &Path, name: &str, left: u8, right: u8, size: u32) -> PathBuf {
    let path = dir.join(name);
    RgbImage::from_fn(size, size, |x, _| {
        let v = if x < size / 2 { left } else { right };
        Rgb([v, v, v])
    })
    .save(&path)
    .expect("write png");
    path
}

pub fn write_label(dir: &Path, stem: &str, content: &str) -> PathBuf {
    let path = dir.join(format!("{}.txt", stem));
    fs::write(&path, content).expect("write label");
    path
}

/// Gray sample with a valid label
pub fn write_valid_sample(dir: &Path, stem: &str, level: u8) {
    write_solid_png(dir, &format!("{}.png", stem), [level, level, level]);
    write_label(dir, stem, VALID_LABEL);
}

pub fn file_names(dir: &Path, extension: &str) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == extension))
        .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names
}
