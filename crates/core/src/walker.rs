use mime_guess::Mime;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

pub type Callback<'a> = Rc<dyn Fn(&Path) + 'a>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub files_seen: usize,
    pub matched: usize,
}

/// Walks a file or directory and hands every file whose media type has a
/// registered callback to those callbacks, in file-name order.
pub struct MediaWalker<'a> {
    base: PathBuf,
    recursive: bool,
    follow_links: bool,
    callbacks: HashMap<String, Vec<Callback<'a>>>,
}

impl<'a> MediaWalker<'a> {
    pub fn new(base: impl Into<PathBuf>, recursive: bool) -> Self {
        Self {
            base: base.into(),
            recursive,
            follow_links: false,
            callbacks: HashMap::new(),
        }
    }

    pub fn follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    /// Registers `callback` for `media_type`. Registering the same callback
    /// twice for one type is a no-op.
    pub fn register(&mut self, media_type: &str, callback: Callback<'a>) {
        let entry = self.callbacks.entry(media_type.to_string()).or_default();
        if !entry.iter().any(|existing| Rc::ptr_eq(existing, &callback)) {
            entry.push(callback);
        }
    }

    pub fn register_all(&mut self, media_types: &[&str], callback: Callback<'a>) {
        for media_type in media_types {
            self.register(media_type, Rc::clone(&callback));
        }
    }

    pub fn start(&self) -> io::Result<WalkStats> {
        let mut stats = WalkStats::default();
        let metadata = fs::metadata(&self.base)?;

        if metadata.is_file() {
            self.check_file(&self.base, &mut stats);
        } else if metadata.is_dir() {
            if self.recursive {
                self.walk_recursive(&mut stats);
            } else {
                self.walk_flat(&mut stats)?;
            }
        }

        Ok(stats)
    }

    fn walk_recursive(&self, stats: &mut WalkStats) {
        let walker = WalkDir::new(&self.base)
            .follow_links(self.follow_links)
            .sort_by_file_name();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    log::warn!("skipping unreadable entry under {}: {err}", self.base.display());
                    continue;
                }
            };
            // Without follow_links a symlink to a file is reported as a link.
            let is_file = entry.file_type().is_file()
                || (entry.path_is_symlink() && entry.path().is_file());
            if is_file {
                self.check_file(entry.path(), stats);
            }
        }
    }

    fn walk_flat(&self, stats: &mut WalkStats) -> io::Result<()> {
        let mut files = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    log::warn!("skipping unreadable entry under {}: {err}", self.base.display());
                    continue;
                }
            };
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        for path in &files {
            self.check_file(path, stats);
        }
        Ok(())
    }

    fn check_file(&self, path: &Path, stats: &mut WalkStats) {
        stats.files_seen += 1;
        let Some(callbacks) = media_type_for(path)
            .and_then(|kind| self.callbacks.get(kind.essence_str()))
        else {
            return;
        };
        stats.matched += 1;
        for callback in callbacks {
            callback(path);
        }
    }
}

/// Guesses a media type from the file extension alone, using the standard
/// extension table.
pub fn media_type_for(path: &Path) -> Option<Mime> {
    mime_guess::from_path(path).first()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use tempfile::tempdir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent");
        }
        fs::write(path, b"x").expect("write file");
    }

    fn sample_tree(root: &Path) {
        touch(&root.join("b.JPEG"));
        touch(&root.join("a.jpg"));
        touch(&root.join("notes.txt"));
        touch(&root.join("sub").join("c.jpg"));
    }

    fn collect(root: &Path, recursive: bool) -> Vec<String> {
        let seen = RefCell::new(Vec::new());
        let mut walker = MediaWalker::new(root, recursive);
        walker.register(
            "image/jpeg",
            Rc::new(|path: &Path| {
                let name = path
                    .strip_prefix(root)
                    .expect("inside root")
                    .to_string_lossy()
                    .replace('\\', "/");
                seen.borrow_mut().push(name);
            }),
        );
        walker.start().expect("walk");
        drop(walker);
        seen.into_inner()
    }

    #[test]
    fn flat_walk_ignores_subdirectories() {
        let temp = tempdir().expect("tempdir");
        sample_tree(temp.path());
        assert_eq!(collect(temp.path(), false), vec!["a.jpg", "b.JPEG"]);
    }

    #[test]
    fn recursive_walk_descends_in_name_order() {
        let temp = tempdir().expect("tempdir");
        sample_tree(temp.path());
        assert_eq!(
            collect(temp.path(), true),
            vec!["a.jpg", "b.JPEG", "sub/c.jpg"]
        );
    }

    #[test]
    fn plain_file_is_checked_directly() {
        let temp = tempdir().expect("tempdir");
        sample_tree(temp.path());
        let hits = Cell::new(0);
        let mut walker = MediaWalker::new(temp.path().join("a.jpg"), true);
        walker.register("image/jpeg", Rc::new(|_: &Path| hits.set(hits.get() + 1)));
        let stats = walker.start().expect("walk");
        assert_eq!(hits.get(), 1);
        assert_eq!(
            stats,
            WalkStats {
                files_seen: 1,
                matched: 1
            }
        );
    }

    #[test]
    fn duplicate_callbacks_are_suppressed() {
        let temp = tempdir().expect("tempdir");
        sample_tree(temp.path());
        let first = Cell::new(0);
        let second = Cell::new(0);
        let callback: Callback = Rc::new(|_: &Path| first.set(first.get() + 1));

        let mut walker = MediaWalker::new(temp.path(), false);
        walker.register("image/jpeg", Rc::clone(&callback));
        walker.register("image/jpeg", Rc::clone(&callback));
        walker.register("image/jpeg", Rc::new(|_: &Path| second.set(second.get() + 1)));
        walker.register_all(&["text/plain", "text/plain"], callback);

        let stats = walker.start().expect("walk");
        assert_eq!(first.get(), 3);
        assert_eq!(second.get(), 2);
        assert_eq!(stats.files_seen, 3);
        assert_eq!(stats.matched, 3);
    }

    #[test]
    fn missing_base_is_an_error() {
        let temp = tempdir().expect("tempdir");
        let walker = MediaWalker::new(temp.path().join("nope"), true);
        assert!(walker.start().is_err());
    }

    fn essence(name: &str) -> Option<String> {
        media_type_for(Path::new(name)).map(|kind| kind.essence_str().to_string())
    }

    #[test]
    fn media_types_come_from_extensions() {
        assert_eq!(essence("x/IMG_1.JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(essence("IMG_1.jpe").as_deref(), Some("image/jpeg"));
        assert_eq!(essence("IMG_1.png").as_deref(), Some("image/png"));
        assert_eq!(essence("scan.tiff").as_deref(), Some("image/tiff"));
        assert_eq!(essence("clip.mp4").as_deref(), Some("video/mp4"));
        assert_eq!(essence("IMG_1.zzqx"), None);
        assert_eq!(essence("README"), None);
    }

    #[test]
    fn any_known_media_type_can_be_registered() {
        let temp = tempdir().expect("tempdir");
        touch(&temp.path().join("clip.mp4"));
        touch(&temp.path().join("a.jpg"));
        let hits = Cell::new(0);
        let mut walker = MediaWalker::new(temp.path(), false);
        walker.register("video/mp4", Rc::new(|_: &Path| hits.set(hits.get() + 1)));
        let stats = walker.start().expect("walk");
        assert_eq!(hits.get(), 1);
        assert_eq!(stats.matched, 1);
    }

    #[cfg(unix)]
    #[test]
    fn linked_files_are_found_in_both_modes() {
        let temp = tempdir().expect("tempdir");
        let real = temp.path().join("real").join("a.jpg");
        touch(&real);
        let photos = temp.path().join("photos");
        fs::create_dir_all(&photos).expect("photos dir");
        std::os::unix::fs::symlink(&real, photos.join("link.jpg")).expect("symlink");
        std::os::unix::fs::symlink(temp.path().join("gone.jpg"), photos.join("dangling.jpg"))
            .expect("dangling symlink");

        assert_eq!(collect(&photos, false), vec!["link.jpg"]);
        assert_eq!(collect(&photos, true), vec!["link.jpg"]);
    }
}
