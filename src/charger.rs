use log::{info, warn};

use crate::{
    chemistry::Chemistry,
    device::DeviceFamily,
    directory::{DIRECTORY_SIZE, MemoryDirectory},
    error::{DecodeError, Error, Result},
    info::{DeviceInfo, INFO_SIZE},
    master::{HidMaster, SessionConfig},
    memory::{PROGRAM_MEMORY_MAX, ProgramMemory, UseFlag},
    registers::{
        Channel, ControlRegister, Limits, ORDER_KEY, Operation, Order, RegisterKind, RegisterMap,
    },
    status::{CHANNEL_STATUS_SIZE, ChannelStatus},
    system::{SYSTEM_SIZE_MAX, SystemConfig},
    transport::HidTransport,
};

/// Program memories listed in directory order, paired with their memory ordinal.
pub type ProgramMemories =
    heapless::Vec<(u8, ProgramMemory), { Limits::DIRECTORY_ENTRIES_MAX }>;

/// You can create a Charger using any interface which implements [HidTransport].
///
/// Every method opens the device, runs its transactions and closes the device again, also when
/// a transaction fails. "read" fetches a block, "write" stores one and commits it with the
/// matching [`Order`].
pub struct Charger<T: HidTransport> {
    master: HidMaster<T>,
    family: DeviceFamily,
    map: RegisterMap,
    /// Filled by [`Self::read_info`], sizes later block reads.
    info: Option<DeviceInfo>,
}

impl<T: HidTransport> Charger<T> {
    /// Create a new Charger for a device of the given family.
    pub fn new(transport: T, family: DeviceFamily, config: SessionConfig) -> Self {
        Self {
            master: HidMaster::new(transport, config),
            family,
            map: RegisterMap::ICHARGER,
            info: None,
        }
    }

    pub fn family(&self) -> DeviceFamily {
        self.family
    }

    /// Identity read by the last [`Self::read_info`].
    pub fn info(&self) -> Option<&DeviceInfo> {
        self.info.as_ref()
    }

    /// Give back the transport.
    pub fn release(self) -> T {
        self.master.release()
    }

    /// Return the device identity.
    pub fn read_info(&mut self) -> Result<DeviceInfo, T::Error> {
        let mut bytes = [0u8; INFO_SIZE];
        {
            let mut session = self.master.session()?;
            session.read_registers(
                RegisterKind::Input,
                self.map.info,
                registers_for(INFO_SIZE),
                &mut bytes,
            )?;
        }
        let info = DeviceInfo::decode(&bytes)?;
        info!(
            "charger {} id {} firmware 0x{:04X}",
            info.serial(),
            info.device_id,
            info.software_version
        );
        self.info = Some(info);
        Ok(info)
    }

    /// Return the live status of one channel.
    pub fn read_channel_status(&mut self, channel: Channel) -> Result<ChannelStatus, T::Error> {
        let mut bytes = [0u8; CHANNEL_STATUS_SIZE];
        let mut session = self.master.session()?;
        session.read_registers(
            RegisterKind::Input,
            self.map.channel_status(channel),
            registers_for(CHANNEL_STATUS_SIZE),
            &mut bytes,
        )?;
        Ok(ChannelStatus::decode(&bytes)?)
    }

    /// Return the system settings.
    pub fn read_system(&mut self) -> Result<SystemConfig, T::Error> {
        let size = self
            .info
            .map_or(self.family.system_size(), |info| info.system_size(self.family))
            .min(SYSTEM_SIZE_MAX);
        let mut bytes = [0u8; SYSTEM_SIZE_MAX];
        let mut session = self.master.session()?;
        session.read_registers(
            RegisterKind::Holding,
            self.map.system,
            registers_for(size),
            &mut bytes,
        )?;
        Ok(SystemConfig::decode(&bytes[..size], self.family)?)
    }

    /// Store the system settings and commit them.
    pub fn write_system(&mut self, system: &SystemConfig) -> Result<(), T::Error> {
        if system.device_family() != self.family {
            return Err(DecodeError::FamilyMismatch.into());
        }
        let bytes = system.encode();
        let mut session = self.master.session()?;
        session.write_registers(self.map.system, registers_for(bytes.len()), &bytes)?;
        send_order(&mut *session, &self.map, Order::WriteSystem)?;
        info!("system settings written");
        Ok(())
    }

    /// Return the program memory directory.
    pub fn read_directory(&mut self) -> Result<MemoryDirectory, T::Error> {
        let mut session = self.master.session()?;
        read_directory(&mut *session, &self.map)
    }

    /// Return the program memory stored at `ordinal`.
    pub fn read_program_memory(&mut self, ordinal: u8) -> Result<ProgramMemory, T::Error> {
        let size = self.program_memory_size();
        let mut session = self.master.session()?;
        read_program_memory(&mut *session, &self.map, self.family, size, ordinal)
    }

    /// Return every program memory listed in the directory, in directory order.
    pub fn read_program_memories(&mut self) -> Result<ProgramMemories, T::Error> {
        let size = self.program_memory_size();
        let mut session = self.master.session()?;
        let directory = read_directory(&mut *session, &self.map)?;

        let mut memories = ProgramMemories::new();
        for ordinal in directory.entries() {
            let memory =
                read_program_memory(&mut *session, &self.map, self.family, size, *ordinal)?;
            // Both are bounded by DIRECTORY_ENTRIES_MAX.
            let pushed = memories.push((*ordinal, memory));
            debug_assert!(pushed.is_ok());
        }
        Ok(memories)
    }

    /// Store `memory` at `ordinal` as a custom program and commit it.
    ///
    /// Built-in ordinals are refused before the device is touched.
    pub fn write_program_memory(
        &mut self,
        ordinal: u8,
        memory: &ProgramMemory,
    ) -> Result<(), T::Error> {
        self.check_custom(ordinal)?;
        let mut session = self.master.session()?;
        write_program_memory(&mut *session, &self.map, self.family, ordinal, memory)?;
        info!("program memory {ordinal} written");
        Ok(())
    }

    /// List a new program memory for `chemistry` and return its ordinal.
    ///
    /// The entry is placed behind the last one of the same chemistry.
    pub fn add_directory_entry(&mut self, chemistry: Chemistry) -> Result<u8, T::Error> {
        let chemistry_ordinal = chemistry
            .ordinal(self.family)
            .ok_or(DecodeError::UnsupportedChemistry)?;

        let mut session = self.master.session()?;
        let mut directory = read_directory(&mut *session, &self.map)?;
        let ordinal = allocate(&mut directory, chemistry_ordinal, self.family)?;
        write_directory(&mut *session, &self.map, &directory)?;
        info!("directory entry {ordinal} added for {}", chemistry.name());
        Ok(ordinal)
    }

    /// Drop the directory entry of a custom program memory.
    pub fn remove_directory_entry(&mut self, ordinal: u8) -> Result<(), T::Error> {
        self.check_custom(ordinal)?;

        let mut session = self.master.session()?;
        let mut directory = read_directory(&mut *session, &self.map)?;
        if !directory.remove(ordinal) {
            warn!("program memory {ordinal} is not listed");
            return Err(Error::NotInDirectory(ordinal));
        }
        write_directory(&mut *session, &self.map, &directory)?;
        info!("directory entry {ordinal} removed");
        Ok(())
    }

    /// Store `memory` in a free custom slot and list it under its chemistry.
    ///
    /// Returns the ordinal used.
    ///
    /// The memory is committed before the directory, so a failed write leaves the directory as
    /// it was.
    pub fn add_program_memory(&mut self, memory: &ProgramMemory) -> Result<u8, T::Error> {
        let chemistry = memory.chemistry(self.family)?;
        let chemistry_ordinal = chemistry
            .ordinal(self.family)
            .ok_or(DecodeError::UnsupportedChemistry)?;

        let mut session = self.master.session()?;
        let mut directory = read_directory(&mut *session, &self.map)?;
        let ordinal = allocate(&mut directory, chemistry_ordinal, self.family)?;
        write_program_memory(&mut *session, &self.map, self.family, ordinal, memory)?;
        write_directory(&mut *session, &self.map, &directory)?;
        info!("program memory {ordinal} added for {}", chemistry.name());
        Ok(ordinal)
    }

    /// Duplicate the program memory at `ordinal` into a new slot, `suffix` appended to its name.
    ///
    /// An unnamed memory is named after its chemistry first. Returns the ordinal of the copy.
    pub fn copy_program_memory(&mut self, ordinal: u8, suffix: &str) -> Result<u8, T::Error> {
        let mut copy = self.read_program_memory(ordinal)?;
        if copy.name().trim_end().is_empty() {
            let chemistry = copy.chemistry(self.family)?;
            copy.set_name(chemistry.name())?;
        }
        copy.append_to_name(suffix)?;
        self.add_program_memory(&copy)
    }

    /// Execute a single order.
    pub fn trans_order(&mut self, order: Order) -> Result<(), T::Error> {
        let mut session = self.master.session()?;
        send_order(&mut *session, &self.map, order)
    }

    /// Run `operation` on `channel` using the program memory at `ordinal`.
    pub fn start_program(
        &mut self,
        operation: Operation,
        channel: Channel,
        ordinal: u8,
    ) -> Result<(), T::Error> {
        let [key_low, key_high] = ORDER_KEY.to_le_bytes();
        let block = [
            operation as u8,
            0,
            ordinal,
            0,
            channel as u8,
            0,
            key_low,
            key_high,
            Order::Run as u8,
            0,
        ];
        let mut session = self.master.session()?;
        session.write_registers(
            self.map.control(ControlRegister::SelectOperation),
            registers_for(block.len()),
            &block,
        )?;
        info!("{operation:?} started on channel {channel:?} with memory {ordinal}");
        Ok(())
    }

    /// Stop whatever runs on `channel`.
    pub fn stop_program(&mut self, channel: Channel) -> Result<(), T::Error> {
        let [key_low, key_high] = ORDER_KEY.to_le_bytes();
        let block = [channel as u8, 0, key_low, key_high, Order::Stop as u8, 0];
        let mut session = self.master.session()?;
        session.write_registers(
            self.map.control(ControlRegister::SelectChannel),
            registers_for(block.len()),
            &block,
        )?;
        info!("channel {channel:?} stopped");
        Ok(())
    }

    fn program_memory_size(&self) -> usize {
        self.info
            .map_or(self.family.program_memory_size(), |info| {
                info.program_memory_size(self.family)
            })
            .min(PROGRAM_MEMORY_MAX)
    }

    fn check_custom(&self, ordinal: u8) -> Result<(), T::Error> {
        let threshold = self.family.first_custom_slot();
        if ordinal < threshold {
            warn!("refusing to touch built-in program memory {ordinal}");
            return Err(Error::BuiltInSlot { ordinal, threshold });
        }
        Ok(())
    }
}

/// Registers covering `bytes` bytes.
fn registers_for(bytes: usize) -> u16 {
    bytes.div_ceil(2) as u16
}

fn send_order<T: HidTransport>(
    master: &mut HidMaster<T>,
    map: &RegisterMap,
    order: Order,
) -> Result<(), T::Error> {
    let [key_low, key_high] = ORDER_KEY.to_le_bytes();
    let address = map.control(ControlRegister::OrderKey);
    master.write_registers(address, 2, &[key_low, key_high, order as u8, 0])?;
    // Disarm the key again.
    master.write_registers(address, 1, &[0, 0])?;
    Ok(())
}

fn select_memory<T: HidTransport>(
    master: &mut HidMaster<T>,
    map: &RegisterMap,
    ordinal: u8,
) -> Result<(), T::Error> {
    master.write_registers(map.control(ControlRegister::SelectMemory), 1, &[ordinal, 0])
}

/// Take a free custom ordinal and list it behind `chemistry_ordinal`.
fn allocate<E: embedded_io::Error>(
    directory: &mut MemoryDirectory,
    chemistry_ordinal: u8,
    family: DeviceFamily,
) -> Result<u8, E> {
    match directory.insert_after(chemistry_ordinal, family.first_custom_slot()) {
        Some(ordinal) => Ok(ordinal),
        None => {
            warn!("no free program memory left");
            Err(Error::DirectoryFull)
        }
    }
}

/// Select `ordinal`, store `memory` there as a custom program and commit it.
fn write_program_memory<T: HidTransport>(
    master: &mut HidMaster<T>,
    map: &RegisterMap,
    family: DeviceFamily,
    ordinal: u8,
    memory: &ProgramMemory,
) -> Result<(), T::Error> {
    let mut memory = memory.clone();
    memory.use_flag = UseFlag::Custom;
    let bytes = memory.encode(family);

    select_memory(master, map, ordinal)?;
    master.write_registers(map.memory, registers_for(bytes.len()), &bytes)?;
    send_order(master, map, Order::WriteMemory)
}

fn read_directory<T: HidTransport>(
    master: &mut HidMaster<T>,
    map: &RegisterMap,
) -> Result<MemoryDirectory, T::Error> {
    let mut bytes = [0u8; DIRECTORY_SIZE];
    master.read_registers(
        RegisterKind::Holding,
        map.memory_head,
        registers_for(DIRECTORY_SIZE),
        &mut bytes,
    )?;
    Ok(MemoryDirectory::decode(&bytes)?)
}

fn write_directory<T: HidTransport>(
    master: &mut HidMaster<T>,
    map: &RegisterMap,
    directory: &MemoryDirectory,
) -> Result<(), T::Error> {
    let bytes = directory.encode();
    master.write_registers(map.memory_head, registers_for(bytes.len()), &bytes)?;
    send_order(master, map, Order::WriteMemoryHead)
}

fn read_program_memory<T: HidTransport>(
    master: &mut HidMaster<T>,
    map: &RegisterMap,
    family: DeviceFamily,
    size: usize,
    ordinal: u8,
) -> Result<ProgramMemory, T::Error> {
    select_memory(master, map, ordinal)?;
    let mut bytes = [0u8; PROGRAM_MEMORY_MAX];
    master.read_registers(RegisterKind::Holding, map.memory, registers_for(size), &mut bytes)?;
    Ok(ProgramMemory::decode(&bytes[..size], family)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ModbusError,
        mock_hid::{MockHid, MockHidError},
        transport::Report,
    };

    fn charger(mock: &mut MockHid, family: DeviceFamily) -> Charger<&mut MockHid> {
        Charger::new(mock, family, SessionConfig::default())
    }

    /// (function, start, count) of a request.
    fn request(report: &Report) -> (u8, u16, u16) {
        (
            report[2],
            u16::from_be_bytes([report[3], report[4]]),
            u16::from_be_bytes([report[5], report[6]]),
        )
    }

    /// Load a directory listing `entries` into the register file.
    fn load_directory(mock: &mut MockHid, entries: &[u8]) {
        let mut bytes = [0u8; DIRECTORY_SIZE];
        bytes[..2].copy_from_slice(&(entries.len() as u16).to_le_bytes());
        bytes[2..2 + entries.len()].copy_from_slice(entries);
        mock.load_bytes(RegisterMap::ICHARGER.memory_head, &bytes);
    }

    fn dump_directory(mock: &MockHid) -> MemoryDirectory {
        let mut bytes = [0u8; DIRECTORY_SIZE];
        mock.dump_bytes(RegisterMap::ICHARGER.memory_head, &mut bytes);
        MemoryDirectory::decode(&bytes).unwrap()
    }

    fn assert_order_sent(sent: &[Report], order: Order) {
        let n = sent.len();
        assert!(n >= 2);
        assert_eq!(request(&sent[n - 2]), (0x10, 0x8003, 2));
        assert_eq!(&sent[n - 2][8..12], &[0x55, 0xAA, 0x00, order as u8]);
        assert_eq!(request(&sent[n - 1]), (0x10, 0x8003, 1));
        assert_eq!(&sent[n - 1][8..10], &[0x00, 0x00]);
    }

    #[test]
    fn test_read_info() {
        let mut mock = MockHid::new();
        let mut bytes = [0u8; INFO_SIZE];
        bytes[0] = 100;
        bytes[2..8].copy_from_slice(b"X6A123");
        bytes[20..22].copy_from_slice(&192u16.to_le_bytes());
        mock.load_bytes(0x0000, &bytes);

        let mut charger = charger(&mut mock, DeviceFamily::X);
        let info = charger.read_info().unwrap();
        assert_eq!(info.device_id, 100);
        assert_eq!(info.serial(), "X6A123");
        assert_eq!(charger.info(), Some(&info));
        drop(charger);

        assert_eq!(mock.sent().len(), 1);
        assert_eq!(request(&mock.sent()[0]), (0x04, 0x0000, 12));
        assert_eq!((mock.opened, mock.closed), (1, 1));
    }

    #[test]
    fn test_read_channel_status_two() {
        let mut mock = MockHid::new();
        let mut bytes = [0u8; CHANNEL_STATUS_SIZE];
        bytes[12..14].copy_from_slice(&16_800u16.to_le_bytes());
        bytes[22..24].copy_from_slice(&4_200u16.to_le_bytes());
        bytes[24..26].copy_from_slice(&4_200u16.to_le_bytes());
        mock.load_bytes(0x0200, &bytes);

        let status = charger(&mut mock, DeviceFamily::Duo)
            .read_channel_status(Channel::Two)
            .unwrap();
        assert_eq!(status.output_voltage, 16_800);
        assert_eq!(status.cell_count(), 2);

        // 87 registers in chunks of 30.
        let sent: heapless::Vec<_, 4> = mock.sent().iter().map(request).collect();
        assert_eq!(
            sent.as_slice(),
            &[(0x04, 0x0200, 30), (0x04, 0x021E, 30), (0x04, 0x023C, 27)]
        );
    }

    #[test]
    fn test_program_memory_loopback() {
        for family in [DeviceFamily::Duo, DeviceFamily::X] {
            let mut mock = MockHid::new();
            let mut memory = ProgramMemory::with_defaults(family, Chemistry::LiPo).unwrap();
            memory.set_name("Pack A").unwrap();
            memory.capacity = 5_000;
            memory.use_flag = UseFlag::Empty;

            let mut charger = charger(&mut mock, family);
            charger.write_program_memory(12, &memory).unwrap();
            let read = charger.read_program_memory(12).unwrap();
            drop(charger);

            memory.use_flag = UseFlag::Custom;
            assert_eq!(read, memory, "{family:?}");
            assert_eq!(mock.register(0x8001), 12);
            assert_eq!(mock.register(0x8004), Order::WriteMemory as u16);
            // Both calls closed what they opened.
            assert_eq!((mock.opened, mock.closed), (2, 2));
        }
    }

    #[test]
    fn test_write_program_memory_sequence() {
        let mut mock = MockHid::new();
        let memory = ProgramMemory::with_defaults(DeviceFamily::X, Chemistry::NiMh).unwrap();
        charger(&mut mock, DeviceFamily::X)
            .write_program_memory(10, &memory)
            .unwrap();

        let sent = mock.sent();
        // Select, 96 registers in chunks of 28, then the order pair.
        assert_eq!(request(&sent[0]), (0x10, 0x8001, 1));
        assert_eq!(request(&sent[1]), (0x10, 0x8C00, 28));
        assert_eq!(request(&sent[4]), (0x10, 0x8C00 + 84, 12));
        assert_eq!(sent.len(), 7);
        assert_order_sent(sent, Order::WriteMemory);
    }

    #[test]
    fn test_built_in_memory_is_refused() {
        for (family, ordinal) in [(DeviceFamily::Duo, 6), (DeviceFamily::X, 9), (DeviceFamily::X, 0)] {
            let mut mock = MockHid::new();
            let memory = ProgramMemory::with_defaults(family, Chemistry::LiFe).unwrap();
            let result = charger(&mut mock, family).write_program_memory(ordinal, &memory);
            assert!(matches!(
                result,
                Err(Error::BuiltInSlot { ordinal: o, threshold }) if o == ordinal && threshold == family.first_custom_slot()
            ));
            assert!(mock.sent().is_empty());
            assert_eq!(mock.opened, 0);
        }
    }

    #[test]
    fn test_duo_reads_reported_memory_length() {
        let mut mock = MockHid::new();
        let mut info = [0u8; INFO_SIZE];
        // Older Duo firmware without the LiHV fields.
        info[20..22].copy_from_slice(&167u16.to_le_bytes());
        mock.load_bytes(0x0000, &info);
        let memory = ProgramMemory::with_defaults(DeviceFamily::Duo, Chemistry::LiPo).unwrap();
        mock.load_bytes(0x8C00, &memory.encode(DeviceFamily::Duo)[..167]);

        let mut charger = charger(&mut mock, DeviceFamily::Duo);
        charger.read_info().unwrap();
        let read = charger.read_program_memory(0).unwrap();
        drop(charger);

        assert_eq!(read.name(), memory.name());
        assert_eq!(read.lihv.charge, 0);
        let total: u16 = mock
            .sent()
            .iter()
            .map(request)
            .filter(|(f, _, _)| *f == 0x03)
            .map(|(_, _, count)| count)
            .sum();
        assert_eq!(total, 84);
    }

    #[test]
    fn test_read_program_memories_in_directory_order() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 10, 1]);
        let memory = ProgramMemory::with_defaults(DeviceFamily::X, Chemistry::LiPo).unwrap();
        mock.load_bytes(0x8C00, &memory.encode(DeviceFamily::X));

        let memories = charger(&mut mock, DeviceFamily::X)
            .read_program_memories()
            .unwrap();
        let ordinals: heapless::Vec<u8, 4> = memories.iter().map(|(o, _)| *o).collect();
        assert_eq!(ordinals.as_slice(), &[0, 10, 1]);

        // Each memory was selected before its block was read.
        let selected: heapless::Vec<u8, 4> = mock
            .sent()
            .iter()
            .filter(|r| request(r) == (0x10, 0x8001, 1))
            .map(|r| r[9])
            .collect();
        assert_eq!(selected.as_slice(), &[0, 10, 1]);
        assert_eq!((mock.opened, mock.closed), (1, 1));
    }

    #[test]
    fn test_add_directory_entry() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 10, 1, 2, 3, 4, 5, 6, 7, 8, 9]);

        let ordinal = charger(&mut mock, DeviceFamily::X)
            .add_directory_entry(Chemistry::LiPo)
            .unwrap();
        assert_eq!(ordinal, 11);
        assert_eq!(
            dump_directory(&mock).entries(),
            &[0, 11, 10, 1, 2, 3, 4, 5, 6, 7, 8, 9]
        );
        assert_order_sent(mock.sent(), Order::WriteMemoryHead);
    }

    #[test]
    fn test_add_directory_entry_when_full() {
        let mut mock = MockHid::new();
        let all: heapless::Vec<u8, 32> = (0..32).collect();
        load_directory(&mut mock, &all);

        let result = charger(&mut mock, DeviceFamily::X).add_directory_entry(Chemistry::NiMh);
        assert!(matches!(result, Err(Error::DirectoryFull)));
        // Only the directory read went out.
        assert!(mock.sent().iter().all(|r| r[2] == 0x03));
        assert_eq!(mock.closed, 1);
    }

    #[test]
    fn test_add_directory_entry_unsupported_chemistry() {
        let mut mock = MockHid::new();
        let result = charger(&mut mock, DeviceFamily::Duo).add_directory_entry(Chemistry::Power);
        assert!(matches!(
            result,
            Err(Error::Decode(DecodeError::UnsupportedChemistry))
        ));
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_remove_directory_entry() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 10, 11, 1, 2]);

        let mut charger = charger(&mut mock, DeviceFamily::X);
        charger.remove_directory_entry(10).unwrap();
        assert!(matches!(
            charger.remove_directory_entry(10),
            Err(Error::NotInDirectory(10))
        ));
        drop(charger);

        assert_eq!(dump_directory(&mock).entries(), &[0, 11, 1, 2]);
        assert_eq!((mock.opened, mock.closed), (2, 2));
    }

    #[test]
    fn test_add_program_memory() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 1, 2, 3, 4, 5, 6]);
        let memory = ProgramMemory::with_defaults(DeviceFamily::Duo, Chemistry::NiMh).unwrap();

        let mut charger = charger(&mut mock, DeviceFamily::Duo);
        let ordinal = charger.add_program_memory(&memory).unwrap();
        assert_eq!(ordinal, 7);
        let read = charger.read_program_memory(ordinal).unwrap();
        drop(charger);

        assert_eq!(read.battery_type, memory.battery_type);
        assert!(read.is_custom());
        // NiMH is Duo ordinal 3.
        assert_eq!(dump_directory(&mock).entries(), &[0, 1, 2, 3, 7, 4, 5, 6]);
    }

    #[test]
    fn test_add_program_memory_skips_built_in_slots() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 1, 2]);
        let memory = ProgramMemory::with_defaults(DeviceFamily::X, Chemistry::LiPo).unwrap();

        let ordinal = charger(&mut mock, DeviceFamily::X)
            .add_program_memory(&memory)
            .unwrap();
        assert_eq!(ordinal, 10);
        assert_eq!(dump_directory(&mock).entries(), &[0, 10, 1, 2]);
        assert_eq!(mock.register(0x8001), 10);
        // The directory commit comes last.
        assert_eq!(mock.register(0x8004), Order::WriteMemoryHead as u16);
        assert_eq!((mock.opened, mock.closed), (1, 1));
    }

    #[test]
    fn test_failed_memory_write_keeps_directory() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 1, 2]);
        mock.reject_address(0x8C00, 0x04);
        let memory = ProgramMemory::with_defaults(DeviceFamily::X, Chemistry::LiPo).unwrap();

        let result = charger(&mut mock, DeviceFamily::X).add_program_memory(&memory);
        assert!(matches!(
            result,
            Err(Error::Modbus(ModbusError::SlaveDeviceFailure))
        ));
        assert_eq!(dump_directory(&mock).entries(), &[0, 1, 2]);
        assert!(mock
            .sent()
            .iter()
            .all(|r| request(r) != (0x10, 0x8800, 17)));
        assert_eq!((mock.opened, mock.closed), (1, 1));
    }

    #[test]
    fn test_copy_program_memory() {
        let mut mock = MockHid::new();
        load_directory(&mut mock, &[0, 1, 2]);
        let mut memory = ProgramMemory::with_defaults(DeviceFamily::X, Chemistry::LiPo).unwrap();
        memory.set_name("Pack").unwrap();
        memory.capacity = 2_200;
        mock.load_bytes(0x8C00, &memory.encode(DeviceFamily::X));

        let mut charger = charger(&mut mock, DeviceFamily::X);
        let ordinal = charger.copy_program_memory(0, " copy").unwrap();
        assert_eq!(ordinal, 10);
        let copy = charger.read_program_memory(ordinal).unwrap();
        drop(charger);

        assert_eq!(copy.name(), "Pack copy");
        assert_eq!(copy.capacity, 2_200);
        assert!(copy.is_custom());
        assert_eq!(dump_directory(&mock).entries(), &[0, 10, 1, 2]);
    }

    #[test]
    fn test_trans_order() {
        let mut mock = MockHid::new();
        charger(&mut mock, DeviceFamily::X)
            .trans_order(Order::MsgboxYes)
            .unwrap();
        assert_eq!(mock.sent().len(), 2);
        assert_order_sent(mock.sent(), Order::MsgboxYes);
        assert_eq!(mock.register(0x8003), 0);
        assert_eq!(mock.register(0x8004), 8);
    }

    #[test]
    fn test_start_program() {
        let mut mock = MockHid::new();
        charger(&mut mock, DeviceFamily::Duo)
            .start_program(Operation::Storage, Channel::Two, 14)
            .unwrap();
        let sent = mock.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(request(&sent[0]), (0x10, 0x8000, 5));
        assert_eq!(
            &sent[0][8..18],
            &[0x00, 0x01, 0x00, 0x0E, 0x00, 0x01, 0x55, 0xAA, 0x00, 0x01]
        );
    }

    #[test]
    fn test_stop_program() {
        let mut mock = MockHid::new();
        charger(&mut mock, DeviceFamily::X)
            .stop_program(Channel::One)
            .unwrap();
        let sent = mock.sent();
        assert_eq!(request(&sent[0]), (0x10, 0x8002, 3));
        assert_eq!(&sent[0][8..14], &[0x00, 0x00, 0x55, 0xAA, 0x00, 0x00]);
    }

    #[test]
    fn test_system_loopback() {
        for family in [DeviceFamily::Duo, DeviceFamily::X] {
            let mut mock = MockHid::new();
            let bytes: heapless::Vec<u8, SYSTEM_SIZE_MAX> =
                (0..family.system_size()).map(|i| (i * 7) as u8).collect();
            mock.load_bytes(0x8400, &bytes);

            let mut charger = charger(&mut mock, family);
            let mut system = charger.read_system().unwrap();
            system.modbus_address = 0x21;
            charger.write_system(&system).unwrap();
            assert_eq!(charger.read_system().unwrap(), system);
            drop(charger);

            assert_eq!(mock.register(0x8004), Order::WriteSystem as u16);
        }
    }

    #[test]
    fn test_write_system_of_other_family() {
        let mut mock = MockHid::new();
        let bytes = [0u8; SYSTEM_SIZE_MAX];
        let system = SystemConfig::decode(&bytes, DeviceFamily::X).unwrap();
        let result = charger(&mut mock, DeviceFamily::Duo).write_system(&system);
        assert!(matches!(
            result,
            Err(Error::Decode(DecodeError::FamilyMismatch))
        ));
        assert_eq!(mock.opened, 0);
    }

    #[test]
    fn test_session_closes_on_error() {
        let mut mock = MockHid::new();
        mock.set_silent(true);
        let result = charger(&mut mock, DeviceFamily::X).read_directory();
        assert!(matches!(result, Err(Error::Modbus(ModbusError::TimedOut))));
        assert_eq!((mock.opened, mock.closed), (1, 1));

        let mut mock = MockHid::new();
        mock.set_write_error(true);
        let result = charger(&mut mock, DeviceFamily::X).trans_order(Order::LogOn);
        assert!(matches!(
            result,
            Err(Error::Transport(MockHidError::SimulatedError))
        ));
        assert_eq!((mock.opened, mock.closed), (1, 1));
    }

    #[test]
    fn test_device_exception_is_reported() {
        let mut mock = MockHid::new();
        mock.reject_address(0x8800, 0x06);
        let result = charger(&mut mock, DeviceFamily::X).read_directory();
        assert!(matches!(result, Err(Error::Modbus(ModbusError::SlaveBusy))));
    }
}
