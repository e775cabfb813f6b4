use std::{error::Error, path::PathBuf};

use chipvm::{config::DEFAULT_CLOCK_HZ, decode, memory::Memory, Config, Emulator, Quirks};
use clap::{Parser, ValueEnum};
use host::{keymap, sound::Beeper, window, window::Screen, Pacer};

mod host;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Preset {
    /// Shift Vx in place, advance I on bulk load/store
    Default,
    /// COSMAC VIP interpreter behaviour
    Cosmac,
    /// SUPER-CHIP era behaviour
    Modern,
}

#[derive(Parser, Debug)]
#[command(name = "chipvm")]
#[command(about = "A CHIP-8 virtual machine")]
struct Args {
    #[arg(help = "ROM image to run")]
    rom: PathBuf,

    #[arg(long, default_value_t = DEFAULT_CLOCK_HZ, help = "Instructions per second")]
    clock_hz: u32,

    #[arg(long, default_value_t = 16, help = "Window scale: 1, 2, 4, 8, 16 or 32")]
    scale: u8,

    #[arg(long, value_enum, default_value = "default", help = "Quirk preset to start from")]
    quirks: Preset,

    #[arg(long, help = "8xy6/8xyE shift Vy into Vx")]
    shift_reads_vy: bool,

    #[arg(long, help = "Fx55/Fx65 leave I unchanged")]
    keep_index: bool,

    #[arg(long, help = "8xy1/8xy2/8xy3 clear VF")]
    logic_resets_vf: bool,

    #[arg(long, help = "Bxnn jumps to xnn + Vx")]
    jump_uses_vx: bool,

    #[arg(long, help = "Wrap sprites around the screen edges")]
    wrap_sprites: bool,

    #[arg(long, help = "Dxyn takes Vy modulo 32 instead of 64")]
    wrap_origin_y: bool,

    #[arg(long, help = "Halt on unknown instructions instead of skipping them")]
    strict: bool,

    #[arg(long, help = "Seed for the random number generator")]
    seed: Option<u64>,

    #[arg(long, help = "Print a listing of the ROM and exit")]
    disassemble: bool,
}

impl Args {
    fn quirks(&self) -> Quirks {
        let mut quirks = match self.quirks {
            Preset::Default => Quirks::default(),
            Preset::Cosmac => Quirks::cosmac(),
            Preset::Modern => Quirks::modern(),
        };
        quirks.shift_reads_vy |= self.shift_reads_vy;
        quirks.load_store_increments_index &= !self.keep_index;
        quirks.logic_resets_vf |= self.logic_resets_vf;
        quirks.jump_offset_uses_vx |= self.jump_uses_vx;
        quirks.wrap_sprites |= self.wrap_sprites;
        quirks.origin_wraps_vertically |= self.wrap_origin_y;
        quirks
    }

    fn config(&self) -> Config {
        Config {
            clock_hz: self.clock_hz,
            quirks: self.quirks(),
            strict_opcodes: self.strict,
            seed: self.seed,
        }
    }
}

fn print_listing(rom: &[u8]) {
    for (addr, word, ins) in decode::disassemble(rom) {
        println!("{addr:03X}: {word:04X}  {ins}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .filter_module("chipvm", log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = Args::parse();

    if args.disassemble {
        let rom = Memory::read_rom_file(&args.rom)?;
        print_listing(&rom);
        return Ok(());
    }

    let scale = window::scale_from_factor(args.scale)
        .ok_or_else(|| format!("unsupported scale {}", args.scale))?;
    let config = args.config();
    log::info!("{config:?}");

    let mut emu = Emulator::new(config);
    emu.load_rom_by_file(&args.rom)?;

    let title = format!("chipvm - {}", args.rom.display());
    let mut screen = Screen::new(&title, scale)?;
    let beeper = match Beeper::new() {
        Ok(beeper) => Some(beeper),
        Err(err) => {
            log::warn!("sound disabled: {err}");
            None
        }
    };

    let mut pacer = Pacer::new(args.clock_hz);
    let mut stopped = false;
    while screen.is_running() {
        keymap::sync(&screen.held_keys(), &mut emu)?;

        if !stopped {
            let cycles = pacer.due_cycles();
            if let Err(fault) = emu.run_cycles(cycles) {
                log::debug!("run loop saw {fault}");
            }
            if emu.halted() {
                log::info!("{:?}", emu.state());
                stopped = true;
            }
        }

        if let Some(beeper) = &beeper {
            beeper.set_active(!stopped && emu.should_buzz());
        }

        if emu.take_redraw() {
            screen.draw(emu.frame())?;
        } else {
            screen.idle();
        }
    }

    Ok(())
}
