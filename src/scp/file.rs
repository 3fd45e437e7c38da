use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};

use super::connection::{scp_command, CopyMode, Direction, ScpConnection};
use super::constants::{DEFAULT_DIRECTORY_MODE, DEFAULT_FILE_MODE};
use super::entry::{EntryKind, ScpEntry};
use super::error::ScpError;
use super::session::ChannelFactory;
use super::stream::{ScpInputStream, ScpOutputStream};

/// Single-file pull adapter: advances to the one expected file entry at
/// construction and exposes its name, size and mode directly.
pub struct ScpFileInputStream<S: Read + Write> {
    connection: ScpConnection<S>,
    entry: ScpEntry,
}

impl<S: Read + Write> ScpFileInputStream<S> {
    pub fn open(stream: S) -> Result<Self, ScpError> {
        let mut connection = ScpConnection::new(stream, Direction::From, CopyMode::FileOnly)?;
        let entry = connection
            .next_entry()?
            .ok_or_else(|| ScpError::Protocol("remote sent no file entry".to_string()))?;
        if !entry.is_file() {
            return Err(ScpError::Protocol(format!(
                "expected a file entry, got {:?}",
                entry.kind()
            )));
        }
        Ok(Self { connection, entry })
    }

    pub fn entry(&self) -> &ScpEntry {
        &self.entry
    }

    pub fn name(&self) -> &str {
        self.entry.name().unwrap_or_default()
    }

    pub fn size(&self) -> u64 {
        self.entry.size()
    }

    pub fn mode(&self) -> &str {
        self.entry.mode().unwrap_or(DEFAULT_FILE_MODE)
    }

    pub fn finish(&mut self) -> Result<(), ScpError> {
        self.connection.finish()
    }

    pub fn into_inner(self) -> S {
        self.connection.into_inner()
    }
}

impl<S: Read + Write> Read for ScpFileInputStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.connection.read_data(buf).map_err(io::Error::from)
    }
}

/// Single-file push adapter: emits the file header at construction, after
/// which exactly `size` bytes must be written before closing.
pub struct ScpFileOutputStream<S: Read + Write> {
    connection: ScpConnection<S>,
}

impl<S: Read + Write> ScpFileOutputStream<S> {
    pub fn create(stream: S, entry: &ScpEntry) -> Result<Self, ScpError> {
        if !entry.is_file() {
            return Err(ScpError::Protocol(format!(
                "expected a file entry, got {:?}",
                entry.kind()
            )));
        }
        let mut connection = ScpConnection::new(stream, Direction::To, CopyMode::FileOnly)?;
        connection.put_entry(entry)?;
        Ok(Self { connection })
    }

    pub fn finish(&mut self) -> Result<(), ScpError> {
        self.connection.finish()
    }

    pub fn into_inner(self) -> S {
        self.connection.into_inner()
    }
}

impl<S: Read + Write> Write for ScpFileOutputStream<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.connection.write_data(buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.connection.flush().map_err(io::Error::from)
    }
}

/// Path-oriented façade: one remote path on one session, with copy
/// operations against the local filesystem or another remote file.
pub struct ScpFile<'a, F: ChannelFactory> {
    factory: &'a mut F,
    remote_path: String,
}

impl<'a, F: ChannelFactory> ScpFile<'a, F> {
    pub fn new(factory: &'a mut F, remote_path: &str) -> Self {
        Self {
            factory,
            remote_path: remote_path.to_string(),
        }
    }

    pub fn remote_path(&self) -> &str {
        &self.remote_path
    }

    /// Downloads the remote file to `local_path`, best-effort applying the
    /// remote permission mode, and returns the parsed entry.
    pub fn copy_to_local(&mut self, local_path: &Path) -> Result<ScpEntry, ScpError> {
        let command = scp_command(Direction::From, CopyMode::FileOnly, &self.remote_path);
        let channel = self.factory.open(&command)?;
        let mut input = ScpFileInputStream::open(channel)?;
        let entry = input.entry().clone();

        let copy_result = (|| -> Result<(), ScpError> {
            let mut file = fs::File::create(local_path)?;
            io::copy(&mut input, &mut file)?;
            Ok(())
        })();
        let finish_result = input.finish();
        let release_result = self.factory.release(input.into_inner());
        copy_result.and(finish_result).and(release_result)?;

        apply_local_mode(local_path, entry.mode());
        info!(
            "downloaded {} ({} bytes) to {}",
            entry.name().unwrap_or("?"),
            entry.size(),
            local_path.display()
        );
        Ok(entry)
    }

    /// Uploads the local file to the remote path, carrying the local
    /// permission bits where the platform exposes them.
    pub fn copy_from_local(&mut self, local_path: &Path) -> Result<(), ScpError> {
        let metadata = fs::metadata(local_path)?;
        if !metadata.is_file() {
            return Err(ScpError::NotAFile(local_path.to_path_buf()));
        }
        let name = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ScpError::NotAFile(local_path.to_path_buf()))?;
        let entry =
            ScpEntry::file_with_mode(name, metadata.len(), &local_mode(&metadata, DEFAULT_FILE_MODE))?;

        let command = scp_command(Direction::To, CopyMode::FileOnly, &self.remote_path);
        let channel = self.factory.open(&command)?;
        let mut output = ScpFileOutputStream::create(channel, &entry)?;

        let copy_result = (|| -> Result<(), ScpError> {
            let mut file = fs::File::open(local_path)?;
            io::copy(&mut file, &mut output)?;
            Ok(())
        })();
        let finish_result = output.finish();
        let release_result = self.factory.release(output.into_inner());
        copy_result.and(finish_result).and(release_result)?;

        info!(
            "uploaded {} ({} bytes) to {}",
            local_path.display(),
            entry.size(),
            self.remote_path
        );
        Ok(())
    }

    /// Streams this remote file into another remote file, possibly on a
    /// different session, without touching the local filesystem.
    pub fn copy_to_remote<G: ChannelFactory>(
        &mut self,
        dest: &mut ScpFile<'_, G>,
    ) -> Result<(), ScpError> {
        let pull = self
            .factory
            .open(&scp_command(Direction::From, CopyMode::FileOnly, &self.remote_path))?;
        let mut input = ScpFileInputStream::open(pull)?;
        let entry = input.entry().clone();

        let push = dest
            .factory
            .open(&scp_command(Direction::To, CopyMode::FileOnly, &dest.remote_path))?;
        let mut output = ScpFileOutputStream::create(push, &entry)?;

        let copy_result = io::copy(&mut input, &mut output)
            .map(|_| ())
            .map_err(ScpError::from);
        let finish_in = input.finish();
        let finish_out = output.finish();
        let release_in = self.factory.release(input.into_inner());
        let release_out = dest.factory.release(output.into_inner());
        copy_result
            .and(finish_in)
            .and(finish_out)
            .and(release_in)
            .and(release_out)
    }

    /// Recursively downloads the remote tree below this path into
    /// `local_root`. Directory modes are applied after the walk so a
    /// restrictive mode cannot block its own children.
    pub fn download_tree(&mut self, local_root: &Path) -> Result<(), ScpError> {
        let command = scp_command(Direction::From, CopyMode::Recursive, &self.remote_path);
        let channel = self.factory.open(&command)?;
        let mut input = ScpInputStream::new(channel, CopyMode::Recursive)?;

        let walk_result = (|| -> Result<(), ScpError> {
            let mut dir = local_root.to_path_buf();
            fs::create_dir_all(&dir)?;
            let mut directory_modes: Vec<(PathBuf, Option<String>)> = Vec::new();
            while let Some(entry) = input.next_entry()? {
                match entry.kind() {
                    EntryKind::Directory => {
                        dir.push(entry.name().unwrap_or_default());
                        fs::create_dir_all(&dir)?;
                        directory_modes.push((dir.clone(), entry.mode().map(str::to_string)));
                        debug!("created directory {}", dir.display());
                    }
                    EntryKind::File => {
                        let path = dir.join(entry.name().unwrap_or_default());
                        let mut file = fs::File::create(&path)?;
                        io::copy(&mut input, &mut file)?;
                        apply_local_mode(&path, entry.mode());
                        debug!("wrote {} ({} bytes)", path.display(), entry.size());
                    }
                    EntryKind::EndOfDirectory => {
                        dir.pop();
                    }
                }
            }
            for (path, mode) in directory_modes.into_iter().rev() {
                apply_local_mode(&path, mode.as_deref());
            }
            Ok(())
        })();
        let finish_result = input.finish();
        let release_result = self.factory.release(input.into_inner());
        walk_result.and(finish_result).and(release_result)
    }

    /// Recursively uploads `local_root` (a directory) to this remote path.
    pub fn upload_tree(&mut self, local_root: &Path) -> Result<(), ScpError> {
        let metadata = fs::metadata(local_root)?;
        if !metadata.is_dir() {
            return Err(ScpError::NotADirectory(local_root.to_path_buf()));
        }
        let name = local_root
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ScpError::NotADirectory(local_root.to_path_buf()))?;

        let command = scp_command(Direction::To, CopyMode::Recursive, &self.remote_path);
        let channel = self.factory.open(&command)?;
        let mut output = ScpOutputStream::new(channel, CopyMode::Recursive)?;

        let walk_result = (|| -> Result<(), ScpError> {
            output.put_entry(&ScpEntry::directory_with_mode(
                name,
                &local_mode(&metadata, DEFAULT_DIRECTORY_MODE),
            )?)?;
            push_tree(&mut output, local_root)?;
            output.put_entry(&ScpEntry::end_of_directory())
        })();
        let finish_result = output.finish();
        let release_result = self.factory.release(output.into_inner());
        walk_result.and(finish_result).and(release_result)
    }
}

fn push_tree<S: Read + Write>(
    output: &mut ScpOutputStream<S>,
    dir: &Path,
) -> Result<(), ScpError> {
    let mut children: Vec<fs::DirEntry> = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    children.sort_by_key(|child| child.file_name());
    for child in children {
        let metadata = child.metadata()?;
        let Some(name) = child.file_name().to_str().map(str::to_string) else {
            return Err(ScpError::Protocol(format!(
                "non-UTF-8 file name under {}",
                dir.display()
            )));
        };
        if metadata.is_dir() {
            output.put_entry(&ScpEntry::directory_with_mode(
                &name,
                &local_mode(&metadata, DEFAULT_DIRECTORY_MODE),
            )?)?;
            push_tree(output, &child.path())?;
            output.put_entry(&ScpEntry::end_of_directory())?;
        } else if metadata.is_file() {
            output.put_entry(&ScpEntry::file_with_mode(
                &name,
                metadata.len(),
                &local_mode(&metadata, DEFAULT_FILE_MODE),
            )?)?;
            let mut file = fs::File::open(child.path())?;
            io::copy(&mut file, output)?;
        }
        // Symlinks and special files are skipped, as plain scp does.
    }
    Ok(())
}

#[cfg(unix)]
fn local_mode(metadata: &fs::Metadata, _default: &str) -> String {
    use std::os::unix::fs::PermissionsExt;
    // Setuid/setgid/sticky bits are dropped; the wire format only carries
    // a leading digit of 0-2.
    format!("0{:03o}", metadata.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn local_mode(_metadata: &fs::Metadata, default: &str) -> String {
    default.to_string()
}

/// Best-effort: maps the remote octal mode onto local permission bits.
/// Failures are logged, not propagated.
#[cfg(unix)]
fn apply_local_mode(path: &Path, mode: Option<&str>) {
    use std::os::unix::fs::PermissionsExt;
    let Some(mode) = mode else {
        return;
    };
    let Ok(bits) = u32::from_str_radix(mode, 8) else {
        return;
    };
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(bits & 0o777)) {
        debug!("could not set mode {} on {}: {}", mode, path.display(), err);
    }
}

#[cfg(not(unix))]
fn apply_local_mode(_path: &Path, _mode: Option<&str>) {}
