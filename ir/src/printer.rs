//! Rendering functions to a textual format, useful for debugging purposes.
use crate::{Function, Instruction, Module, RegisterId};

fn join(values: &[RegisterId]) -> String {
    values
        .iter()
        .map(|v| format!("r{}", v.0))
        .collect::<Vec<_>>()
        .join(", ")
}

fn result(register: Option<RegisterId>) -> String {
    register.map(|r| format!("r{} = ", r.0)).unwrap_or_default()
}

pub fn format_instruction(module: &Module, instruction: &Instruction) -> String {
    match instruction {
        Instruction::Int(v) => {
            format!("r{} = int {}", v.register.0, v.value)
        }
        Instruction::MoveRegister(v) => {
            format!("r{} = move r{}", v.target.0, v.source.0)
        }
        Instruction::Alloca(v) => {
            let count = v
                .count
                .map(|r| format!(", count = r{}", r.0))
                .unwrap_or_default();

            format!(
                "r{} = alloca {:?}, align = {}{}",
                v.register.0,
                module.types.get(v.allocated_type),
                v.alignment,
                count
            )
        }
        Instruction::Load(v) => {
            format!("r{} = load r{}", v.register.0, v.pointer.0)
        }
        Instruction::Store(v) => {
            format!("store r{}, r{}", v.pointer.0, v.value.0)
        }
        Instruction::Call(v) => {
            let name = module
                .get_function(v.callee)
                .map(|f| f.name.as_str())
                .unwrap_or("<removed>");

            format!(
                "{}call {}({})",
                result(v.register),
                name,
                join(&v.arguments)
            )
        }
        Instruction::CallIndirect(v) => {
            format!(
                "{}call r{}({})",
                result(v.register),
                v.pointer.0,
                join(&v.arguments)
            )
        }
        Instruction::CallBuiltin(v) => {
            format!(
                "{}builtin {}({})",
                result(v.register),
                v.builtin.name(),
                join(&v.arguments)
            )
        }
        Instruction::FunctionPointer(v) => {
            let name = module
                .get_function(v.function)
                .map(|f| f.name.as_str())
                .unwrap_or("<removed>");

            format!("r{} = pointer {}", v.register.0, name)
        }
        Instruction::Goto(v) => format!("goto b{}", v.block.0),
        Instruction::Branch(v) => {
            format!(
                "branch r{}, true = b{}, false = b{}",
                v.condition.0, v.if_true.0, v.if_false.0
            )
        }
        Instruction::Return(v) => match v.register {
            Some(reg) => format!("return r{}", reg.0),
            None => "return".to_string(),
        },
    }
}

pub fn format_function(module: &Module, function: &Function) -> String {
    let mut buffer = String::new();

    buffer.push_str(&format!("fn {}(", function.name));
    buffer.push_str(&join(&function.arguments));
    buffer.push_str(")");

    if function.is_declaration() {
        buffer.push_str("\n");
        return buffer;
    }

    buffer.push_str(" {\n");

    for (index, block) in function.body.blocks.iter().enumerate() {
        buffer.push_str(&format!("b{}:\n", index));

        for ins in &block.instructions {
            buffer.push_str("  ");
            buffer.push_str(&format_instruction(module, ins));
            buffer.push_str("\n");
        }
    }

    buffer.push_str("}\n");
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Linkage, TypeId};
    use similar_asserts::assert_eq;

    #[test]
    fn test_format_instruction() {
        let mut module = Module::new("test".to_string());
        let callee = module.add_function("g", Linkage::Local);
        let caller = module.add_function("f", Linkage::External);
        let entry = module.function_mut(caller).body.add_start_block();
        let reg = module.function_mut(caller).registers.alloc(TypeId(0));
        let site =
            module.push_call(caller, entry, Some(reg), callee, Vec::new());
        let ins = module.call_site_instruction(site).unwrap();

        assert_eq!(format_instruction(&module, ins), "r0 = call g()");
    }

    #[test]
    fn test_format_function_declaration() {
        let mut module = Module::new("test".to_string());
        let func = module.add_function("ext", Linkage::External);

        assert_eq!(
            format_function(&module, module.function(func)),
            "fn ext()\n"
        );
    }
}
