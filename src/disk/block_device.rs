use std::io::Result;

/// 定长、按字节寻址的底层存储
/// 每次读写都自己定位，不依赖上一次留下的游标
pub trait BlockDevice: Send {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;
    /// 总字节数
    fn len(&self) -> u64;
    fn sync(&mut self) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
