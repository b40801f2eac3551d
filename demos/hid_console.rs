use inquire::Select;
use icharger_modbus::{
    charger::Charger,
    device::DeviceFamily,
    hid::{HidApiTransport, HidConfig},
    master::SessionConfig,
    projection::{self, LOGICAL_PARAMETERS},
    registers::Channel,
};

// The charger can take a while to answer while it is writing flash.
const SESSION_TIMEOUT_MS: u32 = 1000;

fn main() {
    env_logger::init();

    let family = Select::new("Charger family:", vec!["DUO", "X"])
        .prompt()
        .expect("Failed to select family");
    let family = match family {
        "DUO" => DeviceFamily::Duo,
        _ => DeviceFamily::X,
    };

    let transport =
        HidApiTransport::new(HidConfig::default()).expect("Failed to initialise hidapi");
    let config = SessionConfig {
        timeout: fugit::MillisDurationU32::millis(SESSION_TIMEOUT_MS),
    };
    let mut charger = Charger::new(transport, family, config);

    // Identity first, it sizes the program memory reads.
    let info = charger.read_info().expect("Failed to read device info");
    println!("Serial: {}", info.serial());
    println!("Device ID: {}", info.device_id);
    println!(
        "Software: {}.{:02}  Hardware: {}.{:02}",
        info.software_version / 0x100,
        info.software_version % 0x100,
        info.hardware_version / 0x100,
        info.hardware_version % 0x100
    );

    for channel in [Channel::One, Channel::Two] {
        match charger.read_channel_status(channel) {
            Ok(status) => {
                println!("\n--- Channel {channel:?} ---");
                println!("Output: {} mV, {} cA", status.output_voltage, status.output_current);
                println!("Input: {} mV", status.input_voltage);
                println!("Cells: {}", status.cell_count());
                println!("State: {}", status.error.name());
            }
            Err(e) => println!("Channel {channel:?}: {e}"),
        }
    }

    let memories = charger
        .read_program_memories()
        .expect("Failed to read program memories");
    println!("\n--- Program memories ---");
    let labels: Vec<String> = memories
        .iter()
        .map(|(ordinal, memory)| format!("{ordinal:2} {}", memory.name()))
        .collect();
    let picked = Select::new("Show program memory:", labels.clone())
        .prompt()
        .expect("Failed to select program memory");
    let index = labels.iter().position(|l| *l == picked).unwrap_or(0);
    let (ordinal, memory) = &memories[index];

    let values = projection::project_to_logical(memory, family).expect("Failed to project memory");
    println!("\nMemory {ordinal}: {}", memory.name());
    for (i, value) in values.iter().enumerate().take(LOGICAL_PARAMETERS) {
        if projection::is_active(i, family, memory) {
            println!("{i:2}: {value}");
        }
    }

    println!("\n--- System settings ---");
    let system = charger.read_system().expect("Failed to read system settings");
    println!("{system:#?}");
}
