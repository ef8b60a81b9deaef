/// Turn an arbitrary video title into a filesystem- and header-safe file stem.
#[must_use]
pub fn sanitized_stem(title: &str) -> String {
    let cleaned = title
        .chars()
        .take(50)
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect::<String>();

    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join("_");

    if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    }
}

#[must_use]
pub fn download_file_name(title: &str, quality: &str, extension: &str) -> String {
    let stem = sanitized_stem(title);

    let quality = quality
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect::<String>();

    let extension = extension
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase();

    format!("{stem}_{quality}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_unsafe_characters_from_titles() {
        assert_eq!(
            sanitized_stem("Cute cats: the \"best\" compilation!"),
            "Cute_cats_the_best_compilation"
        );
    }

    #[test]
    fn falls_back_to_generic_stem() {
        assert_eq!(sanitized_stem("!!!???"), "video");
        assert_eq!(sanitized_stem(""), "video");
    }

    #[test]
    fn builds_full_download_names() {
        assert_eq!(
            download_file_name("My Video", "1080p", "MP4"),
            "My_Video_1080p.mp4"
        );
        assert_eq!(
            download_file_name("", "HD (No Watermark)", "mp4"),
            "video_hd__no_watermark_.mp4"
        );
    }
}
