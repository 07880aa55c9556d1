//! A small interpreter for compiled modules, used to observe what the
//! generated code does.
use crate::codegen::{Branch, DecodeError, Instruction, LocalOp, Module, Opcode};
use std::cmp::Ordering;
use thiserror::Error;

pub type VmResult<T> = Result<T, VmError>;

pub const DEFAULT_STEP_LIMIT: u64 = 10_000_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VmError {
    #[error("stack underflow at {address}")]
    StackUnderflow { address: usize },
    #[error("expected {expected} at {address}, found {found}")]
    TypeMismatch {
        address: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error("local slot {slot} is read before being written")]
    UninitializedLocal { slot: u16 },
    #[error("local slot {slot} is out of range")]
    InvalidLocal { slot: u16 },
    #[error("division by zero at {address}")]
    DivisionByZero { address: usize },
    #[error("jump at {address} leaves the code")]
    InvalidJumpTarget { address: usize },
    #[error("missing string constant #{0}")]
    MissingString(u16),
    #[error("gave up after {0} steps")]
    StepLimit(u64),
    #[error("code ended without `return`")]
    MissingReturn,
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Ints and booleans.
    Int(i32),
    Double(f64),
    Str(String),
}

impl Value {
    const fn type_name(&self) -> &'static str {
        match self {
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Str(_) => "String",
        }
    }

    /// Textual form used by `print` and `concat`.
    pub fn render(&self) -> String {
        match self {
            Self::Int(value) => value.to_string(),
            Self::Double(value) => format!("{:?}", value),
            Self::Str(value) => value.clone(),
        }
    }
}

struct Frame {
    stack: Vec<Value>,
    locals: Vec<Option<Value>>,
    output: Vec<String>,
}

impl Frame {
    fn pop(&mut self, address: usize) -> VmResult<Value> {
        self.stack.pop().ok_or(VmError::StackUnderflow { address })
    }

    fn pop_int(&mut self, address: usize) -> VmResult<i32> {
        match self.pop(address)? {
            Value::Int(value) => Ok(value),
            other => Err(VmError::TypeMismatch {
                address,
                expected: "int",
                found: other.type_name(),
            }),
        }
    }

    fn pop_double(&mut self, address: usize) -> VmResult<f64> {
        match self.pop(address)? {
            Value::Double(value) => Ok(value),
            other => Err(VmError::TypeMismatch {
                address,
                expected: "double",
                found: other.type_name(),
            }),
        }
    }

    fn int_op<F>(&mut self, address: usize, op: F) -> VmResult<()>
    where
        F: FnOnce(i32, i32) -> VmResult<i32>,
    {
        let rhs = self.pop_int(address)?;
        let lhs = self.pop_int(address)?;
        self.stack.push(Value::Int(op(lhs, rhs)?));
        Ok(())
    }

    fn double_op<F>(&mut self, address: usize, op: F) -> VmResult<()>
    where
        F: FnOnce(f64, f64) -> f64,
    {
        let rhs = self.pop_double(address)?;
        let lhs = self.pop_double(address)?;
        self.stack.push(Value::Double(op(lhs, rhs)));
        Ok(())
    }

    fn compare_doubles(&mut self, address: usize, nan: i32) -> VmResult<()> {
        let rhs = self.pop_double(address)?;
        let lhs = self.pop_double(address)?;
        let result = match lhs.partial_cmp(&rhs) {
            Some(Ordering::Less) => -1,
            Some(Ordering::Equal) => 0,
            Some(Ordering::Greater) => 1,
            None => nan,
        };
        self.stack.push(Value::Int(result));
        Ok(())
    }

    fn execute(&mut self, op: Opcode, address: usize) -> VmResult<()> {
        let divisor_checked = |lhs: i32, rhs: i32, op: fn(i32, i32) -> i32| {
            if rhs == 0 {
                Err(VmError::DivisionByZero { address })
            } else {
                Ok(op(lhs, rhs))
            }
        };
        match op {
            Opcode::Pop => {
                self.pop(address)?;
            }
            Opcode::Dup => {
                let top = self.pop(address)?;
                self.stack.push(top.clone());
                self.stack.push(top);
            }
            Opcode::IAdd => self.int_op(address, |a, b| Ok(a.wrapping_add(b)))?,
            Opcode::ISub => self.int_op(address, |a, b| Ok(a.wrapping_sub(b)))?,
            Opcode::IMul => self.int_op(address, |a, b| Ok(a.wrapping_mul(b)))?,
            Opcode::IDiv => self.int_op(address, |a, b| divisor_checked(a, b, i32::wrapping_div))?,
            Opcode::IRem => self.int_op(address, |a, b| divisor_checked(a, b, i32::wrapping_rem))?,
            Opcode::IAnd => self.int_op(address, |a, b| Ok(a & b))?,
            Opcode::IOr => self.int_op(address, |a, b| Ok(a | b))?,
            Opcode::IXor => self.int_op(address, |a, b| Ok(a ^ b))?,
            Opcode::DAdd => self.double_op(address, |a, b| a + b)?,
            Opcode::DSub => self.double_op(address, |a, b| a - b)?,
            Opcode::DMul => self.double_op(address, |a, b| a * b)?,
            Opcode::DDiv => self.double_op(address, |a, b| a / b)?,
            Opcode::DRem => self.double_op(address, |a, b| a % b)?,
            Opcode::INeg => {
                let value = self.pop_int(address)?;
                self.stack.push(Value::Int(value.wrapping_neg()));
            }
            Opcode::DNeg => {
                let value = self.pop_double(address)?;
                self.stack.push(Value::Double(-value));
            }
            Opcode::I2D => {
                let value = self.pop_int(address)?;
                self.stack.push(Value::Double(f64::from(value)));
            }
            Opcode::D2I => {
                // saturates, NaN becomes 0
                let value = self.pop_double(address)?;
                self.stack.push(Value::Int(value as i32));
            }
            Opcode::DCmpL => self.compare_doubles(address, -1)?,
            Opcode::DCmpG => self.compare_doubles(address, 1)?,
            Opcode::Concat => {
                let rhs = self.pop(address)?;
                let lhs = self.pop(address)?;
                self.stack.push(Value::Str(lhs.render() + &rhs.render()));
            }
            Opcode::Print => {
                let value = self.pop(address)?.render();
                tracing::debug!(target: "vm", "print {:?}", value);
                self.output.push(value);
            }
            // handled by the dispatch loop
            Opcode::Return => {}
        }
        Ok(())
    }

    fn should_jump(&mut self, branch: Branch, address: usize) -> VmResult<bool> {
        Ok(match branch {
            Branch::Goto => true,
            Branch::IfEq => self.pop_int(address)? == 0,
            Branch::IfNe => self.pop_int(address)? != 0,
            Branch::IfLt => self.pop_int(address)? < 0,
            Branch::IfGe => self.pop_int(address)? >= 0,
            Branch::IfGt => self.pop_int(address)? > 0,
            Branch::IfLe => self.pop_int(address)? <= 0,
            Branch::IfICmpEq
            | Branch::IfICmpNe
            | Branch::IfICmpLt
            | Branch::IfICmpGe
            | Branch::IfICmpGt
            | Branch::IfICmpLe => {
                let rhs = self.pop_int(address)?;
                let lhs = self.pop_int(address)?;
                match branch {
                    Branch::IfICmpEq => lhs == rhs,
                    Branch::IfICmpNe => lhs != rhs,
                    Branch::IfICmpLt => lhs < rhs,
                    Branch::IfICmpGe => lhs >= rhs,
                    Branch::IfICmpGt => lhs > rhs,
                    _ => lhs <= rhs,
                }
            }
        })
    }

    fn access_local(&mut self, op: LocalOp, slot: u16, address: usize) -> VmResult<()> {
        let expected = match op {
            LocalOp::ILoad | LocalOp::IStore => "int",
            LocalOp::DLoad | LocalOp::DStore => "double",
            LocalOp::ALoad | LocalOp::AStore => "String",
        };
        if op.is_store() {
            let value = self.pop(address)?;
            if value.type_name() != expected {
                return Err(VmError::TypeMismatch {
                    address,
                    expected,
                    found: value.type_name(),
                });
            }
            let local = self
                .locals
                .get_mut(usize::from(slot))
                .ok_or(VmError::InvalidLocal { slot })?;
            *local = Some(value);
        } else {
            let value = self
                .locals
                .get(usize::from(slot))
                .ok_or(VmError::InvalidLocal { slot })?
                .clone()
                .ok_or(VmError::UninitializedLocal { slot })?;
            if value.type_name() != expected {
                return Err(VmError::TypeMismatch {
                    address,
                    expected,
                    found: value.type_name(),
                });
            }
            self.stack.push(value);
        }
        Ok(())
    }
}

/// Runs modules to completion, collecting what they print.
#[derive(Debug, Clone, Copy)]
pub struct Machine {
    step_limit: u64,
}

impl Default for Machine {
    fn default() -> Self {
        Self {
            step_limit: DEFAULT_STEP_LIMIT,
        }
    }
}

impl Machine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops programs after `step_limit` instructions.
    #[must_use]
    pub const fn with_step_limit(mut self, step_limit: u64) -> Self {
        self.step_limit = step_limit;
        self
    }

    /// Executes `module` from its first instruction until `return`, and
    /// returns the printed lines.
    pub fn run(&self, module: &Module) -> VmResult<Vec<String>> {
        let code = module.code();
        let mut frame = Frame {
            stack: Vec::new(),
            locals: vec![None; usize::from(module.max_locals())],
            output: Vec::new(),
        };
        let mut pc = 0;
        let mut steps = 0;
        loop {
            if pc >= code.len() {
                return Err(VmError::MissingReturn);
            }
            steps += 1;
            if steps > self.step_limit {
                return Err(VmError::StepLimit(self.step_limit));
            }
            let instr = Instruction::decode(code, pc)?;
            tracing::trace!(target: "vm", pc, "{}", instr);
            let next = pc + instr.encoded_len();
            pc = match instr {
                Instruction::NoArg(Opcode::Return) => break,
                Instruction::NoArg(op) => {
                    frame.execute(op, pc)?;
                    next
                }
                Instruction::Branch(branch, offset) => {
                    if frame.should_jump(branch, pc)? {
                        usize::try_from(pc as i64 + i64::from(offset))
                            .ok()
                            .filter(|target| *target < code.len())
                            .ok_or(VmError::InvalidJumpTarget { address: pc })?
                    } else {
                        next
                    }
                }
                Instruction::Local(op, slot) => {
                    frame.access_local(op, slot, pc)?;
                    next
                }
                Instruction::IntConstant(value) => {
                    frame.stack.push(Value::Int(value));
                    next
                }
                Instruction::DoubleConstant(value) => {
                    frame.stack.push(Value::Double(value));
                    next
                }
                Instruction::StringConstant(index) => {
                    let string = module
                        .strings()
                        .get(usize::from(index))
                        .cloned()
                        .ok_or(VmError::MissingString(index))?;
                    frame.stack.push(Value::Str(string));
                    next
                }
            };
        }
        tracing::debug!(target: "vm", "finished after {} steps", steps);
        Ok(frame.output)
    }
}
