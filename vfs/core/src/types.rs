use bitflags::bitflags;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct FileMode: u32 {
        const IFDIR = 0o040000;
        const IFREG = 0o100000;

        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

impl FileMode {
    /// `S_IFREG | 0666`
    pub fn regular() -> Self {
        FileMode::IFREG
            | FileMode::OWNER_READ
            | FileMode::OWNER_WRITE
            | FileMode::GROUP_READ
            | FileMode::GROUP_WRITE
            | FileMode::OTHER_READ
            | FileMode::OTHER_WRITE
    }

    /// `S_IFDIR | 0777`
    pub fn directory() -> Self {
        FileMode::all() - FileMode::IFREG
    }

    pub fn is_dir(self) -> bool {
        self.contains(FileMode::IFDIR)
    }

    pub fn is_file(self) -> bool {
        self.contains(FileMode::IFREG)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stat {
    pub ino: u64,
    pub mode: FileMode,
    pub nlink: u32,
    pub size: u64,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct StatVfsFlags: u64 {
        const RDONLY = 1 << 0;
        const NOSUID = 1 << 1;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatVfs {
    pub bsize: u64,
    pub frsize: u64,
    pub blocks: u64,
    pub bfree: u64,
    pub bavail: u64,
    pub files: u64,
    pub ffree: u64,
    pub favail: u64,
    pub fsid: u64,
    pub flag: StatVfsFlags,
    pub namemax: u64,
}
