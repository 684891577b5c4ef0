//! Headless gallery view: category filter and lightbox navigation.

use crate::model::GalleryImage;

/// Filter label that shows every image
pub const ALL_CATEGORIES: &str = "all";

/// Selection state for the public gallery page
#[derive(Debug, Clone)]
pub struct GalleryView {
    selected_category: String,
    /// Index into the filtered list of the image open in the lightbox
    lightbox: Option<usize>,
}

impl Default for GalleryView {
    fn default() -> Self {
        Self {
            selected_category: ALL_CATEGORIES.to_string(),
            lightbox: None,
        }
    }
}

impl GalleryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter buttons: "all" followed by the known categories
    pub fn filter_options(categories: &[String]) -> Vec<String> {
        std::iter::once(ALL_CATEGORIES.to_string())
            .chain(categories.iter().cloned())
            .collect()
    }

    pub fn selected_category(&self) -> &str {
        &self.selected_category
    }

    /// Change the filter. Closes the lightbox since indices shift.
    pub fn select_category(&mut self, category: &str) {
        self.selected_category = category.to_string();
        self.lightbox = None;
    }

    pub fn filtered<'a>(&self, images: &'a [GalleryImage]) -> Vec<&'a GalleryImage> {
        if self.selected_category == ALL_CATEGORIES {
            images.iter().collect()
        } else {
            images
                .iter()
                .filter(|image| image.category == self.selected_category)
                .collect()
        }
    }

    pub fn open(&mut self, index: usize) {
        self.lightbox = Some(index);
    }

    pub fn close(&mut self) {
        self.lightbox = None;
    }

    /// Image shown in the lightbox, if it is open and still in range.
    pub fn current<'a>(&self, images: &'a [GalleryImage]) -> Option<&'a GalleryImage> {
        let index = self.lightbox?;
        self.filtered(images).get(index).copied()
    }

    /// Step forward (or back) within the filtered list, wrapping at both ends.
    pub fn navigate<'a>(
        &mut self,
        images: &'a [GalleryImage],
        forward: bool,
    ) -> Option<&'a GalleryImage> {
        let filtered = self.filtered(images);
        let index = self.lightbox?;
        if filtered.is_empty() {
            self.lightbox = None;
            return None;
        }

        let len = filtered.len();
        let index = index.min(len - 1);
        let next = if forward {
            (index + 1) % len
        } else if index == 0 {
            len - 1
        } else {
            index - 1
        };

        self.lightbox = Some(next);
        filtered.get(next).copied()
    }
}
