//! Type stripping rule tables.
//!
//! One table per rule: each row is `(input, expected)`. Markup, literal and
//! operator tables assert the input comes back untouched.

#[cfg(test)]
mod tests {
    use crate::strip_types::{scan_type, scan_type_args, strip_types, Rule};

    fn check(cases: &[(&str, &str)]) {
        for (input, expected) in cases {
            let (out, _) = strip_types(input);
            assert_eq!(&out, expected, "input: {}", input);
        }
    }

    fn unchanged(cases: &[&str]) {
        for input in cases {
            let (out, report) = strip_types(input);
            assert_eq!(&out, input);
            assert_eq!(report.total(), 0, "unexpected rule hit for: {}", input);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // DECLARATIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_interfaces() {
        check(&[
            ("interface Props {\n  title: string;\n}\nconst a = 1;\n", "\nconst a = 1;\n"),
            ("interface B extends A { x: number }\nconst b = 2;", "\nconst b = 2;"),
            ("interface Box<T> { value: T; };\nlet c;", "\nlet c;"),
        ]);
    }

    #[test]
    fn test_type_aliases() {
        check(&[
            ("type Id = string | number;\nconst x = 1;", "\nconst x = 1;"),
            ("type Mode =\n  | 'light'\n  | 'dark';\nlet m;", "\nlet m;"),
            ("type Box<T> = { value: T };\nlet b;", "\nlet b;"),
            ("type Handler = (e: Event) => void\nlet h;", "\nlet h;"),
        ]);
    }

    #[test]
    fn test_class_as_property_name_is_kept() {
        unchanged(&[
            "const attrs = { class: 'x' };\nconst cfg = { a: 1, b: 'two' };",
            "el.class = 'big';\nconst s = { a: 1 };",
            "const k = node?.class;\nconst t = { a: 1 };",
        ]);
        check(&[(
            "const C = class {\n  n: number = 1;\n};",
            "const C = class {\n  n = 1;\n};",
        )]);
    }

    #[test]
    fn test_type_as_identifier_is_kept() {
        unchanged(&["const type = 'primary';\ntype = 'secondary';\n", "config.interface = 1;"]);
    }

    #[test]
    fn test_declare_statements() {
        check(&[
            ("declare const VERSION: string;\nconst v = 1;", "\nconst v = 1;"),
            ("declare module 'x' {\n  export const a: number;\n}\nlet y;", "\nlet y;"),
            ("declare global {\n  interface Window { app: any }\n}\nlet z;", "\nlet z;"),
        ]);
    }

    #[test]
    fn test_enums_become_objects() {
        check(&[
            ("enum Color { Red, Green, Blue }", "const Color = { Red: 0, Green: 1, Blue: 2 };"),
            ("enum Status { Active = 1, Inactive }", "const Status = { Active: 1, Inactive: 2 };"),
            (
                "const enum Dir { Up = 'UP', Down = 'DOWN' };",
                "const Dir = { Up: 'UP', Down: 'DOWN' };",
            ),
            ("enum E { \"a-b\" = 1 }", "const E = { \"a-b\": 1 };"),
            (
                "enum Size {\n  // small\n  Sm,\n  Lg,\n}",
                "const Size = { Sm: 0, Lg: 1 };",
            ),
        ]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // GENERICS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_hook_generics() {
        check(&[
            (
                "const [items, setItems] = useState<Item[]>([]);",
                "const [items, setItems] = useState([]);",
            ),
            (
                "const ref = useRef<HTMLDivElement | null>(null);",
                "const ref = useRef(null);",
            ),
            ("const [n, setN] = React.useState<number>(0);", "const [n, setN] = React.useState(0);"),
            (
                "const Ctx = createContext<Theme | undefined>(undefined);",
                "const Ctx = createContext(undefined);",
            ),
            (
                "const reduce = useReducer<Reducer<State, Action>>(fn, init);",
                "const reduce = useReducer(fn, init);",
            ),
        ]);
    }

    #[test]
    fn test_symbol_generics() {
        check(&[
            ("const data = fetchJson<User[]>(url);", "const data = fetchJson(url);"),
            ("const m = new Map<string, number>();", "const m = new Map();"),
            (
                "function identity<T>(value: T): T {\n  return value;\n}",
                "function identity(value) {\n  return value;\n}",
            ),
            (
                "function pick<T extends object, K extends keyof T>(obj: T, key: K) {}",
                "function pick(obj, key) {}",
            ),
        ]);
    }

    #[test]
    fn test_arrow_type_params() {
        check(&[
            ("const id = <T,>(x: T): T => x;", "const id = (x) => x;"),
            ("const wrap = async <T,>(v: T) => v;", "const wrap = async (v) => v;"),
            (
                "const first = <T extends unknown[]>(xs: T) => xs[0];",
                "const first = (xs) => xs[0];",
            ),
        ]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ANNOTATIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_param_annotations() {
        check(&[
            ("function greet(name: string, age?: number) {}", "function greet(name, age) {}"),
            (
                "const Card = ({ title, count }: CardProps) => {",
                "const Card = ({ title, count }) => {",
            ),
            (
                "const onChange = (e: React.ChangeEvent<HTMLInputElement>) => setValue(e.target.value);",
                "const onChange = (e) => setValue(e.target.value);",
            ),
            ("try {} catch (err: unknown) {}", "try {} catch (err) {}"),
            (
                "const cb = useCallback((id: string, opts: { force: boolean }) => run(id), []);",
                "const cb = useCallback((id, opts) => run(id), []);",
            ),
        ]);
    }

    #[test]
    fn test_this_parameter_is_dropped() {
        check(&[
            ("function f(this: Window, a: number) {}", "function f(a) {}"),
            ("function g(this: HTMLElement) {}", "function g() {}"),
        ]);
        unchanged(&["function h(a) { return this.x; }", "run(this, a);"]);
    }

    #[test]
    fn test_return_annotations() {
        check(&[
            ("function total(items): number {", "function total(items) {"),
            ("const f = (a): string => a;", "const f = (a) => a;"),
            ("const g = async (): Promise<void> => {};", "const g = async () => {};"),
            (
                "function Page({ id }: Props): JSX.Element {",
                "function Page({ id }) {",
            ),
            (
                "function isUser(x: unknown): x is User {",
                "function isUser(x) {",
            ),
        ]);
    }

    #[test]
    fn test_variable_annotations() {
        check(&[
            ("const count: number = 0;", "const count = 0;"),
            ("let user: User | null = null;", "let user = null;"),
            ("let timer!: number;", "let timer;"),
            ("const { a, b }: Props = props;", "const { a, b } = props;"),
            (
                "const List: React.FC<Props> = () => {",
                "const List = () => {",
            ),
            (
                "const styles: Record<string, React.CSSProperties> = {};",
                "const styles = {};",
            ),
        ]);
    }

    #[test]
    fn test_every_declarator_is_stripped() {
        check(&[
            ("let a: number = 1, b: string = 'x';", "let a = 1, b = 'x';"),
            ("const x: A = f(1, 2), y: B = [3, 4];", "const x = f(1, 2), y = [3, 4];"),
            ("const v = ok ? a : b, w: T = 1;", "const v = ok ? a : b, w = 1;"),
            ("let p: number, q: string;", "let p, q;"),
        ]);
        unchanged(&[
            "const o = { a: 1, b: 2 }, p = 3;",
            "let m = new Map(), n = 1;\nfoo(a, b);\nconst r = { s: 1, t: 2 };",
        ]);
    }

    #[test]
    fn test_class_members() {
        check(&[
            (
                "class Store {\n  items: string[] = [];\n  count?: number;\n}",
                "class Store {\n  items = [];\n  count;\n}",
            ),
            (
                "class Svc {\n  private readonly url: string;\n  constructor(private client: Client) {}\n}",
                "class Svc {\n  url;\n  constructor(client) {}\n}",
            ),
            (
                "abstract class Base<T> implements Runner, Stopper {\n}",
                "class Base {\n}",
            ),
            (
                "class Chart extends React.Component<Props, State> {",
                "class Chart extends React.Component {",
            ),
        ]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ASSERTIONS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_as_assertions() {
        check(&[
            (
                "const el = document.getElementById('root') as HTMLElement;",
                "const el = document.getElementById('root');",
            ),
            ("const n = (value as unknown) as number;", "const n = (value);"),
            ("const sizes = ['sm', 'md'] as const;", "const sizes = ['sm', 'md'];"),
            ("const cfg = { a: 1 } as const;", "const cfg = { a: 1 };"),
            ("const fn = handler as (e: Event) => void;", "const fn = handler;"),
            ("const c = config as typeof defaults;", "const c = config;"),
            ("(e.target as HTMLInputElement).value", "(e.target).value"),
        ]);
    }

    #[test]
    fn test_satisfies() {
        check(&[(
            "const routes = { home: '/' } satisfies Routes;",
            "const routes = { home: '/' };",
        )]);
    }

    #[test]
    fn test_non_null() {
        check(&[
            ("ref.current!.focus();", "ref.current.focus();"),
            ("const v = map.get(key)!;", "const v = map.get(key);"),
        ]);
        unchanged(&[
            "if (!ok) {}",
            "const same = a !== b;",
            "return !visible;",
            "if (ready) !done && finish();",
            "while (busy) !stop && step();",
        ]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PRESERVATION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_markup_is_preserved() {
        unchanged(&[
            "return <Button onClick={() => setOpen(!open)} disabled />;",
            "const el = cond ? <A /> : <B prop=\"x: y\" />;",
            "const F = () => <>\n  <Header title=\"a < b\" />\n  <p>Don't panic: it's fine</p>\n</>;",
            "const T = () => <Table<Row> rows={rows} />;",
        ]);
    }

    #[test]
    fn test_expressions_inside_markup_are_stripped() {
        check(&[(
            "const L = () => <ul>{items.map((item: Item) => <li key={item.id}>{item.name}</li>)}</ul>;",
            "const L = () => <ul>{items.map((item) => <li key={item.id}>{item.name}</li>)}</ul>;",
        )]);
    }

    #[test]
    fn test_operators_and_literals_are_preserved() {
        unchanged(&[
            "if (a < b && c > d) {}",
            "for (let i = 0; i<n; i++) {}",
            "const v = (flag ? a : b);",
            "setState({ open: true, count: 1 });",
            "switch (k) {\n  case 'a': return 1;\n  default: return 0;\n}",
            "const re = /<div>/g;",
            "const s = 'a: string';\n// x as Y\n/* type T = 1 */",
            "const big = a ?? b;\nconst c = d?.e;",
        ]);
    }

    #[test]
    fn test_template_expressions_are_stripped() {
        check(&[("const t = `${x as any} and ${y}`;", "const t = `${x} and ${y}`;")]);
        unchanged(&["const s = `caf\\é ${name}`;", "const u = `\\ü`;", "const v = `end\\"]);
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // REPORT & LOOKAHEAD
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_report_counts_rules() {
        let src = "interface P { a: string }\nconst [v, setV] = useState<string>('');\nfunction f(x: number): number { return x as number; }\n";
        let (_, report) = strip_types(src);
        assert_eq!(report.count(Rule::Interface), 1);
        assert_eq!(report.count(Rule::HookGeneric), 1);
        assert_eq!(report.count(Rule::ParamAnnotation), 1);
        assert_eq!(report.count(Rule::ReturnAnnotation), 1);
        assert_eq!(report.count(Rule::AsAssertion), 1);
        assert_eq!(report.total(), 5);
        assert!(report.summary().starts_with("interface x1"));

        let (_, empty) = strip_types("const a = 1;");
        assert_eq!(empty.summary(), "no type syntax found");
    }

    #[test]
    fn test_stripping_is_idempotent() {
        let src = "type A = string;\nconst [a, setA] = useState<A>('');\nconst C = ({ x }: { x: number }): JSX.Element => <div>{x as number}</div>;\n";
        let (once, _) = strip_types(src);
        let (twice, report) = strip_types(&once);
        assert_eq!(once, twice);
        assert_eq!(report.total(), 0);
    }

    #[test]
    fn test_type_lookahead() {
        let src = "Array<Record<string, number>> rest";
        assert_eq!(scan_type(src, 0), Some(src.len() - " rest".len()));
        assert_eq!(scan_type_args("<A, B<C>>(", 0), Some(9));
        assert_eq!(scan_type_args("<div className=\"x\">", 0), None);
        assert_eq!(scan_type_args("<Foo />", 0), None);
    }
}
